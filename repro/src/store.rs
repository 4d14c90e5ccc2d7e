//! Thin object-storage client used as the load-generation surface.
//!
//! The storage service is an external collaborator; this wrapper only
//! exposes the narrow container/blob operations the workload needs.
//! Wire surface: `PUT /{c}?restype=container`, `DELETE /{c}`,
//! `GET /?comp=list` (JSON array of container names) and `PUT /{c}/{b}`
//! with a declared `x-blob-content-length` and an empty body.

use reqwest::StatusCode;
use thiserror::Error;
use tls13_repro_core::{RetrySettings, StorageCredentials};
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed with status {status}")]
    Status { status: StatusCode, url: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("invalid object URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request could not be cloned for a retry attempt")]
    UnclonableRequest,
}

impl StoreError {
    fn status(&self) -> Option<StatusCode> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Container/blob operations the load generator drives. Split out as a
/// trait so tests can substitute a scripted store.
#[trait_variant::make(ObjectStore: Send)]
pub trait LocalObjectStore {
    async fn create_container(&self, name: &str) -> Result<(), StoreError>;
    async fn put_blob(&self, container: &str, name: &str, size: u64) -> Result<(), StoreError>;
    async fn delete_container(&self, name: &str) -> Result<(), StoreError>;
    /// Returns whether the container existed.
    async fn delete_container_if_exists(&self, name: &str) -> Result<bool, StoreError>;
    async fn list_containers(&self) -> Result<Vec<String>, StoreError>;
}

/// Async store client over a pre-built transport. The transport handle
/// is shared read-only across concurrent container cycles.
#[derive(Debug, Clone)]
pub struct BlobStore {
    client: reqwest::Client,
    creds: StorageCredentials,
    retry: Option<RetrySettings>,
}

impl BlobStore {
    pub fn new(
        client: reqwest::Client,
        creds: StorageCredentials,
        retry: Option<RetrySettings>,
    ) -> Self {
        Self {
            client,
            creds,
            retry,
        }
    }

    fn object_url(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.creds.endpoint.join(path)?)
    }

    fn authorization(&self) -> String {
        format!("SharedKey {}:{}", self.creds.account, self.creds.key)
    }

    /// Sends the request, applying the fixed-delay retry policy when
    /// one is configured: the policy's `attempts` counts retries made
    /// after the initial attempt. Transport errors and 5xx responses
    /// are retried; other non-success statuses fail immediately.
    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let req = req.header("authorization", self.authorization());
        let total = 1 + self.retry.map(|r| r.attempts).unwrap_or(0);
        let mut last_err = None;

        for attempt in 0..total {
            if attempt > 0 {
                let delay = self.retry.map(|r| r.delay).unwrap_or_default();
                debug!(attempt, "retrying after fixed delay");
                tokio::time::sleep(delay).await;
            }

            // Requests here carry no streaming body, so a clone is
            // normally available.
            let Some(attempt_req) = req.try_clone() else {
                return Err(last_err.unwrap_or(StoreError::UnclonableRequest));
            };

            match attempt_req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let err = StoreError::Status {
                        status,
                        url: resp.url().to_string(),
                    };
                    if status.is_server_error() {
                        last_err = Some(err);
                    } else {
                        return Err(err);
                    }
                }
                Err(err) => last_err = Some(err.into()),
            }
        }

        Err(last_err.unwrap_or(StoreError::UnclonableRequest))
    }
}

impl ObjectStore for BlobStore {
    async fn create_container(&self, name: &str) -> Result<(), StoreError> {
        let url = self.object_url(name)?;
        self.execute(self.client.put(url).query(&[("restype", "container")]))
            .await?;
        Ok(())
    }

    async fn put_blob(&self, container: &str, name: &str, size: u64) -> Result<(), StoreError> {
        let url = self.object_url(&format!("{container}/{name}"))?;
        self.execute(self.client.put(url).header("x-blob-content-length", size))
            .await?;
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> Result<(), StoreError> {
        let url = self.object_url(name)?;
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    async fn delete_container_if_exists(&self, name: &str) -> Result<bool, StoreError> {
        let url = self.object_url(name)?;
        match self.execute(self.client.delete(url)).await {
            Ok(_) => Ok(true),
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_containers(&self) -> Result<Vec<String>, StoreError> {
        let url = self.object_url("")?;
        let resp = self
            .execute(self.client.get(url).query(&[("comp", "list")]))
            .await?;
        Ok(resp.json().await?)
    }
}


pub mod blocking {
    //! Synchronous twin of [`BlobStore`] for the legacy (Track 1)
    //! variant: same wire surface, no retry policy, no backend choice.

    use super::StoreError;
    use reqwest::StatusCode;
    use tls13_repro_core::StorageCredentials;
    use url::Url;

    pub struct BlobStore {
        client: reqwest::blocking::Client,
        creds: StorageCredentials,
    }

    impl BlobStore {
        pub fn new(client: reqwest::blocking::Client, creds: StorageCredentials) -> Self {
            Self { client, creds }
        }

        fn object_url(&self, path: &str) -> Result<Url, StoreError> {
            Ok(self.creds.endpoint.join(path)?)
        }

        fn execute(
            &self,
            req: reqwest::blocking::RequestBuilder,
        ) -> Result<reqwest::blocking::Response, StoreError> {
            let resp = req
                .header(
                    "authorization",
                    format!("SharedKey {}:{}", self.creds.account, self.creds.key),
                )
                .send()?;
            let status = resp.status();
            if status.is_success() {
                Ok(resp)
            } else {
                Err(StoreError::Status {
                    status,
                    url: resp.url().to_string(),
                })
            }
        }

        pub fn create_container(&self, name: &str) -> Result<(), StoreError> {
            let url = self.object_url(name)?;
            self.execute(self.client.put(url).query(&[("restype", "container")]))?;
            Ok(())
        }

        pub fn put_blob(&self, container: &str, name: &str, size: u64) -> Result<(), StoreError> {
            let url = self.object_url(&format!("{container}/{name}"))?;
            self.execute(self.client.put(url).header("x-blob-content-length", size))?;
            Ok(())
        }

        pub fn delete_container(&self, name: &str) -> Result<(), StoreError> {
            let url = self.object_url(name)?;
            self.execute(self.client.delete(url))?;
            Ok(())
        }

        pub fn delete_container_if_exists(&self, name: &str) -> Result<bool, StoreError> {
            let url = self.object_url(name)?;
            match self.execute(self.client.delete(url)) {
                Ok(_) => Ok(true),
                Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => Ok(false),
                Err(err) => Err(err),
            }
        }

        pub fn list_containers(&self) -> Result<Vec<String>, StoreError> {
            let url = self.object_url("")?;
            let resp = self.execute(self.client.get(url).query(&[("comp", "list")]))?;
            Ok(resp.json()?)
        }
    }
}
