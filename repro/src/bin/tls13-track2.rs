//! Track 2 reproduction variant: connection pooling disabled, a fixed
//! 3x1s retry policy on the store, pre-clearing of the account, then
//! 10 sequential container cycles and the thread diagnosis pass.

use anyhow::Context;
use clap::Parser;
use tls13_repro::diagnose::{self, ProcfsInspector, IDLE_POOL_NEEDLE};
use tls13_repro::store::BlobStore;
use tls13_repro::transport::{self, TransportOptions};
use tls13_repro::workload;
use tls13_repro_core::{
    parse_proxy_flag, ClientBackend, RetrySettings, RunConfig, RuntimeVersion,
    StorageCredentials, TRACK_SHAPE,
};
use tracing::warn;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "tls13-track2")]
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

    println!("Using Track 2 implementation");

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

    // A fresh connection per request maximizes the chance of catching
    // the close/blocking interaction.
    let client = transport::build_client(&TransportOptions {
        run: config,
        disable_pooling: true,
    })?;

    let creds = StorageCredentials::parse(
        &std::env::var("STORAGE_CONNECTION_STRING")
            .context("STORAGE_CONNECTION_STRING must be set")?,
    )?;
    let store = BlobStore::new(client, creds, Some(RetrySettings::default()));

    if let Err(err) = workload::clear_account(&store).await {
        warn!("failed to clear pre-existing containers: {err}");
    }

    let report = workload::run_sequential(&store, TRACK_SHAPE).await;
    report.log();

    let diagnosis = diagnose::diagnose(&ProcfsInspector::new(), IDLE_POOL_NEEDLE)?;
    diagnosis.verdict()?;

    Ok(())
}
