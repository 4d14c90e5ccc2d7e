use crate::{RETRY_ATTEMPTS, RETRY_DELAY};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid HTTP client backend '{0}', valid values are 'netty' and 'okhttp'")]
    InvalidBackend(String),

    #[error("connection string is missing the '{0}' field")]
    MissingField(&'static str),

    #[error("connection string segment '{0}' is not a key=value pair")]
    MalformedSegment(String),

    #[error("connection string endpoint is not a valid URL: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// The two HTTP client backends the harness can drive. The names
/// follow the upstream bug report; `netty` selects the rustls-backed
/// connector and `okhttp` the native-tls one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientBackend {
    Netty,
    OkHttp,
}

impl FromStr for ClientBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "netty" => Ok(ClientBackend::Netty),
            "okhttp" => Ok(ClientBackend::OkHttp),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

impl fmt::Display for ClientBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientBackend::Netty => f.write_str("netty"),
            ClientBackend::OkHttp => f.write_str("okhttp"),
        }
    }
}

/// Lenient boolean parser for the proxy flag: `"true"` in any casing
/// enables proxying, anything else is false.
pub fn parse_proxy_flag(s: &str) -> Result<bool, Infallible> {
    Ok(s.eq_ignore_ascii_case("true"))
}

/// Immutable per-run configuration, built once from the arguments.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub backend: ClientBackend,
    pub proxy: bool,
}

/// Parsed form of the `endpoint=<url>;account=<name>;key=<secret>`
/// connection string. Threaded explicitly into the store client; there
/// is no ambient global.
#[derive(Debug, Clone)]
pub struct StorageCredentials {
    pub endpoint: Url,
    pub account: String,
    pub key: String,
}

impl StorageCredentials {
    pub fn parse(connection_string: &str) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut account = None;
        let mut key = None;

        for segment in connection_string.split(';').filter(|s| !s.is_empty()) {
            let (name, value) = segment
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedSegment(segment.to_string()))?;
            match name {
                "endpoint" => endpoint = Some(value.to_string()),
                "account" => account = Some(value.to_string()),
                "key" => key = Some(value.to_string()),
                // Unknown segments are tolerated for forward compatibility.
                _ => {}
            }
        }

        Ok(StorageCredentials {
            endpoint: Url::parse(&endpoint.ok_or(ConfigError::MissingField("endpoint"))?)?,
            account: account.ok_or(ConfigError::MissingField("account"))?,
            key: key.ok_or(ConfigError::MissingField("key"))?,
        })
    }
}

/// Fixed-count, fixed-delay retry policy attached to the Track 2
/// store client.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Retries issued after the initial attempt.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: RETRY_ATTEMPTS,
            delay: RETRY_DELAY,
        }
    }
}
