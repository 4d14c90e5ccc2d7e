use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tls13_repro::store::{blocking, BlobStore};
use tls13_repro::transport::{build_blocking_client, build_client, TransportOptions};
use tls13_repro_core::{ClientBackend, RetrySettings, RunConfig, StorageCredentials, WorkloadShape};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

pub const MOCK_ADDR: &str = "127.0.0.1:3002";

#[allow(unused)]
pub async fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    let wait = ONCE_LOCK.get().is_none();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_env_filter("tls13_repro=debug,mock_store=debug")
            .init();

        // On a dedicated runtime thread so the server outlives any
        // single test's runtime.
        std::thread::spawn(|| {
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(async {
                    let addr: SocketAddr = MOCK_ADDR.parse().unwrap();
                    mock_store::run(addr).await;
                });
        });
    });

    if wait {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// The mock store keeps global state, so tests that touch it take
/// this lock and call `mock_store::reset()` first.
#[allow(unused)]
pub async fn exclusive() -> tokio::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(())).lock().await
}

#[allow(unused)]
pub fn test_store() -> BlobStore {
    let client = build_client(&TransportOptions {
        run: RunConfig {
            backend: ClientBackend::Netty,
            proxy: false,
        },
        disable_pooling: false,
    })
    .unwrap();
    BlobStore::new(client, test_creds(), None)
}

#[allow(unused)]
pub fn retrying_store(retry: RetrySettings) -> BlobStore {
    let client = build_client(&TransportOptions {
        run: RunConfig {
            backend: ClientBackend::Netty,
            proxy: false,
        },
        disable_pooling: false,
    })
    .unwrap();
    BlobStore::new(client, test_creds(), Some(retry))
}

#[allow(unused)]
pub fn blocking_test_store() -> blocking::BlobStore {
    let client = build_blocking_client(false).unwrap();
    blocking::BlobStore::new(client, test_creds())
}

fn test_creds() -> StorageCredentials {
    StorageCredentials::parse(&format!("endpoint=http://{MOCK_ADDR};account=test;key=secret"))
        .unwrap()
}

#[allow(unused)]
pub fn small_shape(containers: usize, blobs: usize) -> WorkloadShape {
    WorkloadShape {
        containers,
        blobs_per_container: blobs,
        blob_size: 4096,
    }
}
