//! Parses the text data-response envelope returned by `POST /downloads`
//! into a reset flag, per-list delete sets, and a list of chunk-container
//! URLs, then realises those URLs into a lazy [`gsb_domain_models::SyncDelta`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use gsb_domain_models::{ChunkStream, ChunkStreamError, ListName, SyncDelta};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("data-response body is not valid ASCII")]
    NotAscii,
    #[error("expected poll interval as first line, got {0:?}")]
    MissingPollInterval(String),
    #[error("response line has unexpected prefix: {0:?}")]
    UnexpectedPrefix(String),
    #[error("'u:' line before any 'i:' list context")]
    UrlWithoutListContext,
    #[error("malformed chunk-number range in {prefix}: {source}")]
    BadRange {
        prefix: &'static str,
        #[source]
        source: gsb_core_rangecodec::RangeCodecError,
    },
}

/// A fetched-and-decoded chunk URL, or the transport/decode failure that
/// occurred while realising it.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ChunkStreamError>;
}

/// The parsed envelope, before its chunk URLs have been fetched.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub next_delay_seconds: i64,
    pub reset_required: bool,
    pub del_add: BTreeMap<ListName, Vec<u32>>,
    pub del_sub: BTreeMap<ListName, Vec<u32>>,
    pub chunk_urls: Vec<(ListName, String)>,
}

/// Parses the raw `downloads` response body (spec §4.4).
pub fn parse_envelope(body: &[u8]) -> Result<Envelope, EnvelopeError> {
    let text = std::str::from_utf8(body).map_err(|_| EnvelopeError::NotAscii)?;
    let mut lines = text.split('\n');

    let first = lines.next().unwrap_or("").trim_end();
    let next_delay_seconds = first
        .strip_prefix("n:")
        .and_then(|rest| rest.trim().parse::<i64>().ok())
        .ok_or_else(|| EnvelopeError::MissingPollInterval(first.to_string()))?;

    let mut reset_required = false;
    let mut del_add: BTreeMap<ListName, Vec<u32>> = BTreeMap::new();
    let mut del_sub: BTreeMap<ListName, Vec<u32>> = BTreeMap::new();
    let mut chunk_urls: Vec<(ListName, String)> = Vec::new();
    let mut current_list: Option<ListName> = None;

    for raw_line in lines {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix("i:") {
            current_list = Some(ListName::new(name));
        } else if let Some(url) = line.strip_prefix("u:") {
            let list = current_list.clone().ok_or(EnvelopeError::UrlWithoutListContext)?;
            let absolute = if url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };
            chunk_urls.push((list, absolute));
        } else if line.strip_prefix("r:").is_some() {
            warn!("reset is required");
            reset_required = true;
        } else if let Some(range_text) = line.strip_prefix("ad:") {
            let list = current_list.clone().ok_or(EnvelopeError::UrlWithoutListContext)?;
            let numbers = gsb_core_rangecodec::expand([range_text])
                .map_err(|source| EnvelopeError::BadRange { prefix: "ad:", source })?;
            del_add.entry(list).or_default().extend(numbers);
        } else if let Some(range_text) = line.strip_prefix("sd:") {
            let list = current_list.clone().ok_or(EnvelopeError::UrlWithoutListContext)?;
            let numbers = gsb_core_rangecodec::expand([range_text])
                .map_err(|source| EnvelopeError::BadRange { prefix: "sd:", source })?;
            del_sub.entry(list).or_default().extend(numbers);
        } else {
            return Err(EnvelopeError::UnexpectedPrefix(line.to_string()));
        }
    }

    Ok(Envelope {
        next_delay_seconds,
        reset_required,
        del_add,
        del_sub,
        chunk_urls,
    })
}

impl Envelope {
    /// Turns the parsed envelope into a `SyncDelta` whose `new_chunks`
    /// stream lazily fetches and decodes each chunk URL in turn.
    pub fn into_sync_delta(self, transport: std::sync::Arc<dyn ChunkTransport>) -> SyncDelta {
        let urls = self.chunk_urls;
        let new_chunks: ChunkStream = Box::pin(
            stream::iter(urls)
                .then(move |(list, url)| {
                    let transport = transport.clone();
                    async move {
                        let bytes = transport.get(&url).await?;
                        gsb_protocol_chunk::decode_container(&bytes, &list)
                            .map_err(|e| Box::new(e) as ChunkStreamError)
                    }
                })
                .flat_map(|result| match result {
                    Ok(chunks) => stream::iter(chunks.into_iter().map(Ok)).left_stream(),
                    Err(e) => stream::iter(vec![Err(e)]).right_stream(),
                }),
        );

        SyncDelta {
            reset_required: self.reset_required,
            del_add: self.del_add,
            del_sub: self.del_sub,
            new_chunks,
        }
    }
}
