use std::net::SocketAddr;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    FmtSubscriber::builder()
        .with_env_filter("mock_store=debug")
        .init();

    let addr: SocketAddr = "0.0.0.0:3000".parse().unwrap();
    mock_store::run(addr).await;
}
