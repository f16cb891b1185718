//! Composes the URL canonicalizer, the prefix-list/full-hash protocol
//! clients, and storage into the two operations the rest of the world
//! sees: `sync()` and `lookup(url)` (spec §2).

mod config;
mod errors;
mod lookup;

pub use config::{default_subscribed_lists, ClientConfig};
pub use errors::FacadeError;
pub use lookup::LookupResult;

use std::sync::Arc;

use gsb_core_canon::LookupUrl;
use gsb_infra_storage::{FullHashRecord, Storage, StorageStats};
use gsb_protocol_client::{FullHashClient, PrefixListClient, ReqwestTransport, Transport};
use gsb_protocol_delay::now_unix;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// The composed client: one [`Storage`] handle, one prefix-list client,
/// one full-hash client, serialized behind a single mutex so `sync()`
/// calls cannot interleave and `lookup()` never observes a half-applied
/// delta (spec §5; see `DESIGN.md` for why this implementation chooses
/// serialization over snapshot reads).
pub struct SafeBrowsingClient {
    storage: Storage,
    prefix_list: PrefixListClient,
    full_hash: FullHashClient,
    guard: Mutex<()>,
}

impl SafeBrowsingClient {
    #[instrument(skip(config), fields(db_path = %config.db_path))]
    pub async fn connect(config: ClientConfig) -> Result<Self, FacadeError> {
        let storage = Storage::connect(&config.db_path).await?;
        let transport: Arc<dyn Transport> = Arc::new(
            ReqwestTransport::new(config.http_timeout, &config.user_agent)
                .map_err(gsb_protocol_client::ClientError::from)?,
        );
        let prefix_list = PrefixListClient::new(
            transport.clone(),
            config.api_key.clone(),
            config.subscribed_lists.clone(),
            config.discard_fair_use,
        );
        let full_hash = FullHashClient::new(transport, config.api_key.clone(), config.discard_fair_use);

        Ok(Self {
            storage,
            prefix_list,
            full_hash,
            guard: Mutex::new(()),
        })
    }

    /// One round-trip against `downloads`: fetch the current inventory,
    /// request the delta, and apply it as a single transaction (spec §2,
    /// §4.6, §4.8).
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<(), FacadeError> {
        let _permit = self.guard.lock().await;
        let existing = self.storage.get_existing_chunks().await?;
        let delta = self.prefix_list.fetch_missing(&existing).await?;
        self.storage.apply_delta(delta).await?;
        info!("sync complete");
        Ok(())
    }

    /// Canonicalizes `url`, enumerates its permutations, and tests each
    /// prefix against the cache — resolving any positive prefix hit to a
    /// full hash via `gethash` when the cached full-hash entry has
    /// expired or is absent (spec §2, §4.7, §8 invariant 5).
    #[instrument(skip(self))]
    pub async fn lookup(&self, url: &str) -> Result<LookupResult, FacadeError> {
        let _permit = self.guard.lock().await;
        let lookup_url = LookupUrl::new(url);
        let now = now_unix();

        let mut matches = Vec::new();
        for (full_hash, prefix) in lookup_url.hashes() {
            if !self.storage.lookup_hash_prefix(&prefix).await? {
                continue;
            }
            if self.storage.full_hash_sync_required(&prefix, now).await? {
                self.refresh_full_hashes(&prefix, now).await?;
            }
            let hits = self.storage.lookup_full_hash(&full_hash, now).await?;
            matches.extend(hits);
        }
        matches.sort();
        matches.dedup();
        Ok(LookupResult { matches })
    }

    async fn refresh_full_hashes(&self, prefix: &[u8; 4], now: i64) -> Result<(), FacadeError> {
        let response = self.full_hash.get_full_hashes(&[prefix.to_vec()]).await?;
        for (list, entries) in response.by_list {
            let records: Vec<FullHashRecord> = entries
                .into_iter()
                .map(|e| FullHashRecord {
                    full_hash: e.full_hash,
                    metadata: e.metadata,
                })
                .collect();
            self.storage.store_full_hashes(&list, &records, response.cache_lifetime, now).await?;
        }
        Ok(())
    }

    /// Deletes every row in the store (the CLI's `purge` sans the file
    /// delete, which is the CLI's own responsibility — spec §6).
    pub async fn purge(&self) -> Result<(), FacadeError> {
        let _permit = self.guard.lock().await;
        self.storage.total_cleanup().await?;
        warn!("storage purged");
        Ok(())
    }

    pub async fn stats(&self) -> Result<StorageStats, FacadeError> {
        Ok(self.storage.stats().await?)
    }

    pub async fn list_subscribed_lists(&self) -> Result<Vec<String>, FacadeError> {
        Ok(self.prefix_list.list_subscribed_lists().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsb_domain_models::{Chunk, ChunkType, PrefixLength};

    async fn test_client() -> (SafeBrowsingClient, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("gsb.db").to_str().unwrap().to_string();
        let mut config = ClientConfig::new("test-key", db_path);
        config.discard_fair_use = true;
        let client = SafeBrowsingClient::connect(config).await.unwrap();
        (client, dir)
    }

    #[tokio::test]
    async fn lookup_on_empty_store_is_clean() {
        let (client, _dir) = test_client().await;
        let result = client.lookup("http://example.com/").await.unwrap();
        assert!(result.is_clean());
        assert_eq!(result.exit_code(), 0);
    }

    #[tokio::test]
    async fn stats_reflect_stored_chunks() {
        let (client, _dir) = test_client().await;
        let chunk = Chunk::new(
            gsb_domain_models::ListName::new("goog-malware-shavar"),
            ChunkType::Add,
            1,
            PrefixLength::Short,
            vec![vec![1, 2, 3, 4]],
        );
        client.storage.store_chunk(&chunk).await.unwrap();
        let stats = client.stats().await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.prefixes, 1);
    }

    #[tokio::test]
    async fn purge_empties_the_store() {
        let (client, _dir) = test_client().await;
        let chunk = Chunk::new(
            gsb_domain_models::ListName::new("goog-malware-shavar"),
            ChunkType::Add,
            1,
            PrefixLength::Short,
            vec![vec![1, 2, 3, 4]],
        );
        client.storage.store_chunk(&chunk).await.unwrap();
        client.purge().await.unwrap();
        let stats = client.stats().await.unwrap();
        assert_eq!(stats.chunks, 0);
    }
}
