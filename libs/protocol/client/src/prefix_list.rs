//! Drives the `downloads` endpoint: builds the existing-chunks request
//! body, posts it, parses the data-response envelope, and assembles the
//! lazy [`SyncDelta`] (spec §4.6).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use gsb_domain_models::{ChunkRange, ChunkStreamError, ListName, SyncDelta};
use gsb_protocol_delay::DelayController;
use gsb_protocol_envelope::{parse_envelope, ChunkTransport};
use tracing::{info, instrument};

use crate::transport::Transport;
use crate::ClientError;

const BASE_URL: &str = "https://safebrowsing.google.com/safebrowsing/";

pub struct PrefixListClient {
    transport: Arc<dyn Transport>,
    delay: DelayController,
    api_key: String,
    subscribed_lists: Vec<ListName>,
}

impl PrefixListClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_key: impl Into<String>,
        subscribed_lists: Vec<ListName>,
        discard_fair_use: bool,
    ) -> Self {
        Self {
            transport,
            delay: DelayController::new_prefix_list(discard_fair_use),
            api_key: api_key.into(),
            subscribed_lists,
        }
    }

    pub fn delay(&self) -> &DelayController {
        &self.delay
    }

    fn url(&self, service: &str) -> String {
        format!("{BASE_URL}{service}?key={}&client=api&appver=0.1&pver=3.0", self.api_key)
    }

    fn request_body(&self, existing: &BTreeMap<ListName, ChunkRange>) -> Vec<u8> {
        let mut lines = Vec::with_capacity(self.subscribed_lists.len());
        for list in &self.subscribed_lists {
            match existing.get(list).filter(|range| !range.is_empty()) {
                None => lines.push(format!("{list};")),
                Some(range) => {
                    let mut line = format!("{list};a:{}", range.add.as_deref().unwrap_or(""));
                    if let Some(sub) = &range.sub {
                        line.push_str(&format!(":s:{sub}"));
                    }
                    lines.push(line);
                }
            }
        }
        let mut body = lines.join("\n");
        body.push('\n');
        body.into_bytes()
    }

    /// Blocks for the fair-use delay, posts the existing-chunks inventory
    /// to `downloads`, and returns a `SyncDelta` whose `new_chunks`
    /// stream lazily fetches and decodes each referenced chunk URL.
    #[instrument(skip(self, existing))]
    pub async fn fetch_missing(&self, existing: &BTreeMap<ListName, ChunkRange>) -> Result<SyncDelta, ClientError> {
        self.delay.wait().await.map_err(|_| ClientError::Cancelled)?;

        let url = self.url("downloads");
        let body = self.request_body(existing);
        let response = match self.transport.post(&url, body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.delay.on_error();
                return Err(e.into());
            }
        };
        self.delay.mark_http_success();

        let envelope = parse_envelope(&response)?;
        self.delay.set_next_call_timeout(envelope.next_delay_seconds);
        info!(next_delay = envelope.next_delay_seconds, new_urls = envelope.chunk_urls.len(), "downloads poll complete");

        let chunk_transport: Arc<dyn ChunkTransport> = Arc::new(TransportAsChunkTransport(self.transport.clone()));
        Ok(envelope.into_sync_delta(chunk_transport))
    }

    /// POSTs `/list` and returns the whitespace-split list of subscribable
    /// list names (spec §4.6, supplemented from `gglsbl3::getLists`).
    pub async fn list_subscribed_lists(&self) -> Result<Vec<String>, ClientError> {
        let url = self.url("list");
        let bytes = match self.transport.post(&url, Vec::new()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.delay.on_error();
                return Err(e.into());
            }
        };
        self.delay.mark_http_success();
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

struct TransportAsChunkTransport(Arc<dyn Transport>);

#[async_trait]
impl ChunkTransport for TransportAsChunkTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ChunkStreamError> {
        self.0.get(url).await.map_err(|e| Box::new(e) as ChunkStreamError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeTransport(std::sync::Mutex<Vec<u8>>);

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(&self, _url: &str, _body: Vec<u8>) -> Result<Vec<u8>, crate::transport::TransportError> {
            Ok(self.0.lock().unwrap().clone())
        }
        async fn get(&self, _url: &str) -> Result<Vec<u8>, crate::transport::TransportError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn request_body_lists_empty_lists_without_a_clause() {
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport(std::sync::Mutex::new(b"n:100\n".to_vec())));
        let client = PrefixListClient::new(transport, "key", vec![ListName::new("goog-malware-shavar")], true);
        let body = client.request_body(&BTreeMap::new());
        assert_eq!(body, b"goog-malware-shavar;\n");
    }

    #[test]
    fn request_body_includes_add_and_sub_ranges() {
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport(std::sync::Mutex::new(Vec::new())));
        let client = PrefixListClient::new(transport, "key", vec![ListName::new("goog-malware-shavar")], true);
        let mut existing = BTreeMap::new();
        existing.insert(
            ListName::new("goog-malware-shavar"),
            ChunkRange { add: Some("1-4".to_string()), sub: Some("5".to_string()) },
        );
        let body = client.request_body(&existing);
        assert_eq!(body, b"goog-malware-shavar;a:1-4:s:5\n");
    }

    #[tokio::test]
    async fn fetch_missing_resets_delay_from_envelope() {
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport(std::sync::Mutex::new(b"n:1704\n".to_vec())));
        let client = PrefixListClient::new(transport, "key", vec![ListName::new("goog-malware-shavar")], true);
        let delta = client.fetch_missing(&BTreeMap::new()).await.unwrap();
        assert!(!delta.reset_required);
    }
}
