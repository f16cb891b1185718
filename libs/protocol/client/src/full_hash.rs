//! Drives the `gethash` endpoint: posts a batch of hash prefixes and
//! parses the full-hash response, subject to its own fair-use delay
//! (spec §4.5, §4.7).

use std::sync::Arc;

use gsb_protocol_delay::DelayController;
use tracing::instrument;

use crate::gethash_wire::{encode_request, parse_response, FullHashResponse};
use crate::transport::Transport;
use crate::ClientError;

const BASE_URL: &str = "https://safebrowsing.google.com/safebrowsing/";

pub struct FullHashClient {
    transport: Arc<dyn Transport>,
    delay: DelayController,
    api_key: String,
}

impl FullHashClient {
    pub fn new(transport: Arc<dyn Transport>, api_key: impl Into<String>, discard_fair_use: bool) -> Self {
        Self {
            transport,
            delay: DelayController::new_full_hash(discard_fair_use),
            api_key: api_key.into(),
        }
    }

    pub fn delay(&self) -> &DelayController {
        &self.delay
    }

    fn url(&self) -> String {
        format!("{BASE_URL}gethash?key={}&client=api&appver=0.1&pver=3.0", self.api_key)
    }

    /// Resolves a batch of equal-length hash prefixes to full hashes plus
    /// any attached metadata (spec §4.7).
    #[instrument(skip(self, prefixes))]
    pub async fn get_full_hashes(&self, prefixes: &[Vec<u8>]) -> Result<FullHashResponse, ClientError> {
        self.delay.wait().await.map_err(|_| ClientError::Cancelled)?;

        let body = encode_request(prefixes)?;
        let response = match self.transport.post(&self.url(), body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.delay.on_error();
                return Err(e.into());
            }
        };
        self.delay.mark_http_success();

        parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeTransport(Vec<u8>);

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(&self, _url: &str, _body: Vec<u8>) -> Result<Vec<u8>, crate::transport::TransportError> {
            Ok(self.0.clone())
        }
        async fn get(&self, _url: &str) -> Result<Vec<u8>, crate::transport::TransportError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn resolves_prefixes_to_full_hashes() {
        let mut body = b"600\ngoog-malware-shavar:32:1\n".to_vec();
        body.extend_from_slice(&[0xABu8; 32]);
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport(body));
        let client = FullHashClient::new(transport, "key", true);
        let result = client.get_full_hashes(&[vec![0xAB, 0xAB, 0xAB, 0xAB]]).await.unwrap();
        assert_eq!(result.cache_lifetime, 600);
        assert_eq!(result.by_list.len(), 1);
    }
}
