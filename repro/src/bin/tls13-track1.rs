//! Track 1 (legacy client) reproduction variant: the synchronous
//! store client, two concurrent load rounds separated by a 10 second
//! pause to widen the window in which the peer invalidates idle pooled
//! connections, then the thread diagnosis pass.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::thread;
use tls13_repro::diagnose::{self, ProcfsInspector, IDLE_POOL_NEEDLE};
use tls13_repro::store::blocking::BlobStore;
use tls13_repro::transport;
use tls13_repro::workload::blocking;
use tls13_repro_core::{
    parse_proxy_flag, RuntimeVersion, StorageCredentials, POOL_WAIT_CEILING, ROUND_PAUSE,
    TRACK_SHAPE,
};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "tls13-track1")]
struct Args {
    /// Pass `true` to route traffic through the local debugging proxy.
    /// The legacy client has no backend choice, so this is the only
    /// argument.
    #[arg(default_value = "false", value_parser = parse_proxy_flag)]
    proxy: bool,
}

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("tls13_repro=info")
        .init();

    println!("Using Track 1 implementation");

    let version: RuntimeVersion = std::env::var("RUNTIME_VERSION")
        .context("RUNTIME_VERSION must be set")?
        .parse()?;
    println!("Runtime version: {version}");
    tls13_repro_core::check_affected(version)?;

    let args = Args::parse();

    let client = transport::build_blocking_client(args.proxy)?;
    let creds = StorageCredentials::parse(
        &std::env::var("STORAGE_CONNECTION_STRING")
            .context("STORAGE_CONNECTION_STRING must be set")?,
    )?;
    let store = Arc::new(BlobStore::new(client, creds));

    blocking::run_round(&store, TRACK_SHAPE, POOL_WAIT_CEILING).log();

    // Leave the pooled connections idle long enough for the peer to
    // close them, then load again over the stale pool.
    thread::sleep(ROUND_PAUSE);

    blocking::run_round(&store, TRACK_SHAPE, POOL_WAIT_CEILING).log();

    let diagnosis = diagnose::diagnose(&ProcfsInspector::new(), IDLE_POOL_NEEDLE)?;
    diagnosis.verdict()?;

    Ok(())
}
