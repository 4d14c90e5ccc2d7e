//! Sequential reproduction variant: 100 container cycles of 100 blobs
//! each over a TLS 1.3-only transport with connection pooling left on,
//! then a thread diagnosis pass.

use anyhow::Context;
use clap::Parser;
use tls13_repro::diagnose::{self, ProcfsInspector, IDLE_POOL_NEEDLE};
use tls13_repro::store::BlobStore;
use tls13_repro::transport::{self, TransportOptions};
use tls13_repro::workload;
use tls13_repro_core::{
    parse_proxy_flag, ClientBackend, RunConfig, RuntimeVersion, StorageCredentials,
    SEQUENTIAL_SHAPE,
};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "tls13")]
struct Args {
    /// HTTP client backend, `netty` or `okhttp`.
    #[arg(default_value_t = ClientBackend::Netty)]
    backend: ClientBackend,

    /// Pass `true` to route traffic through the local debugging proxy.
    #[arg(default_value = "false", value_parser = parse_proxy_flag)]
    proxy: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("tls13_repro=info")
        .init();

    let version: RuntimeVersion = std::env::var("RUNTIME_VERSION")
        .context("RUNTIME_VERSION must be set")?
        .parse()?;
    println!("Runtime version: {version}");
    tls13_repro_core::check_affected(version)?;

    let args = Args::parse();
    let config = RunConfig {
        backend: args.backend,
        proxy: args.proxy,
    };

    let client = transport::build_client(&TransportOptions {
        run: config,
        disable_pooling: false,
    })?;

    let creds = StorageCredentials::parse(
        &std::env::var("STORAGE_CONNECTION_STRING")
            .context("STORAGE_CONNECTION_STRING must be set")?,
    )?;
    let store = BlobStore::new(client, creds, None);

    // The bug needs many connections opened and dropped: churn through
    // containers and blobs, then look at the threads left behind.
    let report = workload::run_sequential(&store, SEQUENTIAL_SHAPE).await;
    report.log();

    let diagnosis = diagnose::diagnose(&ProcfsInspector::new(), IDLE_POOL_NEEDLE)?;
    diagnosis.verdict()?;

    Ok(())
}
