//! The HTTP transport the protocol clients are driven through. Kept as a
//! trait (spec §1 treats the transport as an external collaborator,
//! "assumed to provide a `POST url, bytes -> bytes | HttpError`") so the
//! prefix-list/full-hash clients and the chunk-URL fetcher can be
//! exercised in tests against a fake, without sockets.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("{url} responded with non-2xx status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError>;
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// `reqwest`-backed transport with a bounded per-request timeout; a
/// timeout counts as an HTTP error for the Delay Controller (spec §5).
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|source| TransportError::Network {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    fn map_error(url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout: Duration::default(),
            }
        } else {
            TransportError::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(url)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| Self::map_error(url, e))?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| Self::map_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| Self::map_error(url, e))?;
        Ok(bytes.to_vec())
    }
}
