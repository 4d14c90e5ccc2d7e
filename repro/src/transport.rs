//! Client configurator: builds HTTP transports restricted to TLS 1.3.
//!
//! The bug only manifests when the server is free to skip
//! `close_notify`, so every transport negotiates TLS 1.3 and nothing
//! else. This also gives an early out if the target endpoint does not
//! support TLS 1.3 at all. Building a client opens no connections.

use reqwest::tls::Version;
use reqwest::Proxy;
use std::time::Duration;
use thiserror::Error;
use tls13_repro_core::{ClientBackend, RunConfig, PROXY_ADDR};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to construct the HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub run: RunConfig,
    /// Forces a fresh connection per logical request, maximizing the
    /// chance of observing the close/blocking interaction.
    pub disable_pooling: bool,
}

/// Builds the async transport for the modern variants.
pub fn build_client(opts: &TransportOptions) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder()
        .min_tls_version(Version::TLS_1_3)
        .max_tls_version(Version::TLS_1_3);

    builder = match opts.run.backend {
        ClientBackend::Netty => builder.use_rustls_tls(),
        ClientBackend::OkHttp => builder.use_native_tls(),
    };

    if opts.disable_pooling {
        builder = builder
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(1));
    }

    if opts.run.proxy {
        builder = builder.proxy(Proxy::all(format!("http://{PROXY_ADDR}"))?);
    }

    Ok(builder.build()?)
}

/// Builds the synchronous transport for the legacy (Track 1) variant,
/// which has no backend choice.
pub fn build_blocking_client(proxy: bool) -> Result<reqwest::blocking::Client, TransportError> {
    let mut builder = reqwest::blocking::Client::builder()
        .min_tls_version(Version::TLS_1_3)
        .max_tls_version(Version::TLS_1_3);

    if proxy {
        builder = builder.proxy(Proxy::all(format!("http://{PROXY_ADDR}"))?);
    }

    Ok(builder.build()?)
}
