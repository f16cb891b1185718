//! Persistent store for chunks, hash prefixes, and full-hash entries
//! (spec §4.8): a single embedded `libsql` database file, with a
//! transactional apply of a remote [`SyncDelta`] and the prefix/full-hash
//! lookups the façade needs to answer `lookup(url)` offline.

mod errors;
mod schema;

pub use errors::StorageError;

use std::collections::BTreeMap;

use futures::StreamExt;
use gsb_domain_models::{Chunk, ChunkRange, ChunkType, ListName, SyncDelta};
use libsql::{params, Builder, Connection, Database, Transaction};
use tracing::{info, instrument, warn};

/// One decoded full-hash response entry, ready to be cached against the
/// prefix that triggered the `gethash` round-trip.
#[derive(Debug, Clone)]
pub struct FullHashRecord {
    pub full_hash: [u8; 32],
    pub metadata: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub chunks: u64,
    pub prefixes: u64,
    pub full_hashes: u64,
}

pub struct Storage {
    database: Database,
}

impl Storage {
    /// Opens (creating if absent) the database file at `path` and applies
    /// the idempotent schema.
    #[instrument(skip(path))]
    pub async fn connect(path: &str) -> Result<Self, StorageError> {
        let database = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let connection = database
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        schema::apply(&connection).await?;
        info!(%path, "storage ready");
        Ok(Self { database })
    }

    fn connection(&self) -> Result<Connection, StorageError> {
        self.database
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Per-list add/sub chunk-number inventory, range-compressed — the
    /// body of the next `downloads` request (spec §4.6).
    pub async fn get_existing_chunks(&self) -> Result<BTreeMap<ListName, ChunkRange>, StorageError> {
        let connection = self.connection()?;
        let mut adds: BTreeMap<ListName, Vec<u32>> = BTreeMap::new();
        let mut subs: BTreeMap<ListName, Vec<u32>> = BTreeMap::new();

        let mut rows = connection
            .query(
                "SELECT list_name, chunk_type, chunk_number FROM chunk ORDER BY list_name, chunk_number",
                (),
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let list_name: String = row.get(0)?;
            let chunk_type: String = row.get(1)?;
            let chunk_number: i64 = row.get(2)?;
            let list = ListName::new(list_name);
            match parse_chunk_type(&chunk_type)? {
                ChunkType::Add => adds.entry(list).or_default().push(chunk_number as u32),
                ChunkType::Sub => subs.entry(list).or_default().push(chunk_number as u32),
            }
        }

        let mut out: BTreeMap<ListName, ChunkRange> = BTreeMap::new();
        for (list, numbers) in adds {
            out.entry(list).or_default().add = gsb_core_rangecodec::compress(numbers);
        }
        for (list, numbers) in subs {
            out.entry(list).or_default().sub = gsb_core_rangecodec::compress(numbers);
        }
        Ok(out)
    }

    pub async fn chunk_exists(&self, list: &ListName, chunk_type: ChunkType, chunk_number: u32) -> Result<bool, StorageError> {
        let connection = self.connection()?;
        let mut rows = connection
            .query(
                "SELECT 1 FROM chunk WHERE list_name = ?1 AND chunk_number = ?2 AND chunk_type = ?3",
                params![list.as_str(), chunk_number, chunk_type_str(chunk_type)],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Inserts `chunk` and its hash prefixes; a no-op if the (list,
    /// type, number) triple is already present (spec §3 invariant).
    pub async fn store_chunk(&self, chunk: &Chunk) -> Result<(), StorageError> {
        let connection = self.connection()?;
        let tx = connection
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        store_chunk_tx(&tx, chunk).await?;
        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_add_chunks(&self, list: &ListName, numbers: &[u32]) -> Result<(), StorageError> {
        let connection = self.connection()?;
        let tx = connection
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        delete_chunks_tx(&tx, list, ChunkType::Add, numbers).await?;
        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_sub_chunks(&self, list: &ListName, numbers: &[u32]) -> Result<(), StorageError> {
        let connection = self.connection()?;
        let tx = connection
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        delete_chunks_tx(&tx, list, ChunkType::Sub, numbers).await?;
        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    /// True iff some live add-chunk holds `prefix` (4 bytes) and no
    /// sub-chunk in the same list cancels it (spec §3, §4.8).
    pub async fn lookup_hash_prefix(&self, prefix: &[u8]) -> Result<bool, StorageError> {
        let connection = self.connection()?;
        let mut rows = connection
            .query(
                "SELECT 1 FROM hash_prefix a
                 WHERE a.chunk_type = 'add'
                   AND (
                        (a.prefix_length = 4 AND a.value = ?1)
                        OR (a.prefix_length = 32 AND substr(a.value, 1, 4) = ?1)
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM hash_prefix s
                       WHERE s.chunk_type = 'sub'
                         AND s.list_name = a.list_name
                         AND (
                              (s.prefix_length = 4 AND s.value = ?1)
                              OR (s.prefix_length = 32 AND substr(s.value, 1, 4) = ?1)
                         )
                   )
                 LIMIT 1",
                params![prefix.to_vec()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Exact match against non-expired full-hash entries.
    pub async fn lookup_full_hash(&self, full_hash: &[u8; 32], now: i64) -> Result<Vec<(ListName, Option<i32>)>, StorageError> {
        let connection = self.connection()?;
        let mut rows = connection
            .query(
                "SELECT list_name, metadata FROM full_hash WHERE value = ?1 AND expires_at > ?2",
                params![full_hash.to_vec(), now],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let list_name: String = row.get(0)?;
            let metadata: Option<i64> = row.get(1)?;
            out.push((ListName::new(list_name), metadata.map(|m| m as i32)));
        }
        Ok(out)
    }

    /// True iff no non-expired full-hash entry exists for any hash with
    /// this 4-byte prefix — i.e. a `gethash` round-trip is still needed.
    pub async fn full_hash_sync_required(&self, prefix: &[u8], now: i64) -> Result<bool, StorageError> {
        let connection = self.connection()?;
        let mut rows = connection
            .query(
                "SELECT 1 FROM full_hash WHERE substr(value, 1, 4) = ?1 AND expires_at > ?2 LIMIT 1",
                params![prefix.to_vec(), now],
            )
            .await?;
        Ok(rows.next().await?.is_none())
    }

    /// Caches the full hashes returned for one `gethash` round-trip,
    /// with `expires_at = now + cache_lifetime`.
    pub async fn store_full_hashes(
        &self,
        list: &ListName,
        records: &[FullHashRecord],
        cache_lifetime: i64,
        now: i64,
    ) -> Result<(), StorageError> {
        let connection = self.connection()?;
        let expires_at = now + cache_lifetime;
        for record in records {
            connection
                .execute(
                    "INSERT OR REPLACE INTO full_hash (list_name, value, metadata, expires_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        list.as_str(),
                        record.full_hash.to_vec(),
                        record.metadata.map(|m| m as i64),
                        expires_at
                    ],
                )
                .await?;
        }
        Ok(())
    }

    /// Applies a whole `SyncDelta` as one transaction: reset (if
    /// required), then deletes, then new chunks, skipping any already
    /// present. Any failure rolls the transaction back (spec §3, §5).
    #[instrument(skip(self, delta))]
    pub async fn apply_delta(&self, mut delta: SyncDelta) -> Result<(), StorageError> {
        let connection = self.connection()?;
        let tx = connection
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        if delta.reset_required {
            warn!("reset required: purging store before applying delta");
            total_cleanup_tx(&tx).await?;
        }
        for (list, numbers) in &delta.del_add {
            delete_chunks_tx(&tx, list, ChunkType::Add, numbers).await?;
        }
        for (list, numbers) in &delta.del_sub {
            delete_chunks_tx(&tx, list, ChunkType::Sub, numbers).await?;
        }
        while let Some(result) = delta.new_chunks.next().await {
            let chunk = result.map_err(|e| StorageError::Mapping(e.to_string()))?;
            store_chunk_tx(&tx, &chunk).await?;
        }

        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    pub async fn total_cleanup(&self) -> Result<(), StorageError> {
        let connection = self.connection()?;
        let tx = connection
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        total_cleanup_tx(&tx).await?;
        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StorageStats, StorageError> {
        let connection = self.connection()?;
        let chunks = count(&connection, "SELECT COUNT(*) FROM chunk").await?;
        let prefixes = count(&connection, "SELECT COUNT(*) FROM hash_prefix").await?;
        let full_hashes = count(&connection, "SELECT COUNT(*) FROM full_hash").await?;
        Ok(StorageStats { chunks, prefixes, full_hashes })
    }
}

async fn count(connection: &Connection, sql: &str) -> Result<u64, StorageError> {
    let mut rows = connection.query(sql, ()).await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)? as u64),
        None => Ok(0),
    }
}

async fn store_chunk_tx(tx: &Transaction, chunk: &Chunk) -> Result<(), StorageError> {
    let list = chunk.list_name.as_str();
    let chunk_type = chunk_type_str(chunk.chunk_type);

    let mut existing = tx
        .query(
            "SELECT 1 FROM chunk WHERE list_name = ?1 AND chunk_number = ?2 AND chunk_type = ?3",
            params![list, chunk.chunk_number, chunk_type],
        )
        .await?;
    if existing.next().await?.is_some() {
        return Ok(());
    }

    tx.execute(
        "INSERT INTO chunk (list_name, chunk_number, chunk_type) VALUES (?1, ?2, ?3)",
        params![list, chunk.chunk_number, chunk_type],
    )
    .await?;

    let prefix_length = chunk.prefix_length.bytes() as i64;
    for hash in &chunk.hashes {
        tx.execute(
            "INSERT INTO hash_prefix (list_name, chunk_number, chunk_type, prefix_length, value) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![list, chunk.chunk_number, chunk_type, prefix_length, hash.clone()],
        )
        .await?;
    }
    Ok(())
}

async fn delete_chunks_tx(tx: &Transaction, list: &ListName, chunk_type: ChunkType, numbers: &[u32]) -> Result<(), StorageError> {
    let type_str = chunk_type_str(chunk_type);
    for &number in numbers {
        tx.execute(
            "DELETE FROM chunk WHERE list_name = ?1 AND chunk_number = ?2 AND chunk_type = ?3",
            params![list.as_str(), number, type_str],
        )
        .await?;
        tx.execute(
            "DELETE FROM hash_prefix WHERE list_name = ?1 AND chunk_number = ?2 AND chunk_type = ?3",
            params![list.as_str(), number, type_str],
        )
        .await?;
    }
    Ok(())
}

async fn total_cleanup_tx(tx: &Transaction) -> Result<(), StorageError> {
    tx.execute("DELETE FROM chunk", ()).await?;
    tx.execute("DELETE FROM hash_prefix", ()).await?;
    tx.execute("DELETE FROM full_hash", ()).await?;
    tx.execute("DELETE FROM sub_reference", ()).await?;
    Ok(())
}

fn chunk_type_str(chunk_type: ChunkType) -> &'static str {
    match chunk_type {
        ChunkType::Add => "add",
        ChunkType::Sub => "sub",
    }
}

fn parse_chunk_type(s: &str) -> Result<ChunkType, StorageError> {
    match s {
        "add" => Ok(ChunkType::Add),
        "sub" => Ok(ChunkType::Sub),
        other => Err(StorageError::Mapping(format!("unknown chunk_type {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsb_domain_models::PrefixLength;

    async fn temp_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gsb_test.db");
        let storage = Storage::connect(path.to_str().unwrap()).await.unwrap();
        (storage, dir)
    }

    fn fake_chunk(list: &str, number: u32, chunk_type: ChunkType, hashes: Vec<Vec<u8>>) -> Chunk {
        Chunk::new(ListName::new(list), chunk_type, number, PrefixLength::Short, hashes)
    }

    #[tokio::test]
    async fn store_then_exists() {
        let (storage, _dir) = temp_storage().await;
        let chunk = fake_chunk("goog-malware-shavar", 1, ChunkType::Add, vec![vec![1, 2, 3, 4]]);
        storage.store_chunk(&chunk).await.unwrap();
        assert!(storage
            .chunk_exists(&ListName::new("goog-malware-shavar"), ChunkType::Add, 1)
            .await
            .unwrap());
        assert!(!storage
            .chunk_exists(&ListName::new("goog-malware-shavar"), ChunkType::Add, 2)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn storing_same_chunk_twice_is_a_noop() {
        let (storage, _dir) = temp_storage().await;
        let chunk = fake_chunk("goog-malware-shavar", 1, ChunkType::Add, vec![vec![1, 2, 3, 4]]);
        storage.store_chunk(&chunk).await.unwrap();
        storage.store_chunk(&chunk).await.unwrap();
        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.prefixes, 1);
    }

    #[tokio::test]
    async fn sub_chunk_cancels_matching_add_prefix() {
        let (storage, _dir) = temp_storage().await;
        let list = ListName::new("goog-malware-shavar");
        storage
            .store_chunk(&fake_chunk("goog-malware-shavar", 1, ChunkType::Add, vec![vec![9, 9, 9, 9]]))
            .await
            .unwrap();
        assert!(storage.lookup_hash_prefix(&[9, 9, 9, 9]).await.unwrap());

        storage
            .store_chunk(&fake_chunk("goog-malware-shavar", 1, ChunkType::Sub, vec![vec![9, 9, 9, 9]]))
            .await
            .unwrap();
        assert!(!storage.lookup_hash_prefix(&[9, 9, 9, 9]).await.unwrap());
        let _ = list;
    }

    #[tokio::test]
    async fn reset_purges_before_delta_is_applied() {
        let (storage, _dir) = temp_storage().await;
        storage
            .store_chunk(&fake_chunk("goog-malware-shavar", 1, ChunkType::Add, vec![vec![1, 1, 1, 1]]))
            .await
            .unwrap();

        let delta = SyncDelta {
            reset_required: true,
            del_add: Default::default(),
            del_sub: Default::default(),
            new_chunks: Box::pin(futures::stream::once(async {
                Ok(fake_chunk("goog-malware-shavar", 2, ChunkType::Add, vec![vec![2, 2, 2, 2]]))
            })),
        };
        storage.apply_delta(delta).await.unwrap();

        assert!(!storage
            .chunk_exists(&ListName::new("goog-malware-shavar"), ChunkType::Add, 1)
            .await
            .unwrap());
        assert!(storage
            .chunk_exists(&ListName::new("goog-malware-shavar"), ChunkType::Add, 2)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn get_existing_chunks_round_trips_range_codec() {
        let (storage, _dir) = temp_storage().await;
        for n in [1u32, 2, 3, 5] {
            storage
                .store_chunk(&fake_chunk("goog-malware-shavar", n, ChunkType::Add, vec![]))
                .await
                .unwrap();
        }
        let existing = storage.get_existing_chunks().await.unwrap();
        let range = existing.get(&ListName::new("goog-malware-shavar")).unwrap();
        assert_eq!(range.add.as_deref(), Some("1-3,5"));
        assert_eq!(range.sub, None);
    }

    #[tokio::test]
    async fn full_hash_lifetime_expiry() {
        let (storage, _dir) = temp_storage().await;
        let list = ListName::new("goog-malware-shavar");
        let full_hash = [7u8; 32];
        storage
            .store_full_hashes(&list, &[FullHashRecord { full_hash, metadata: Some(2) }], 600, 1_000)
            .await
            .unwrap();

        assert!(!storage.full_hash_sync_required(&full_hash[..4], 1_100).await.unwrap());
        let hits = storage.lookup_full_hash(&full_hash, 1_100).await.unwrap();
        assert_eq!(hits, vec![(list.clone(), Some(2))]);

        // past expiry (inserted_at 1000 + lifetime 600 = 1600)
        assert!(storage.full_hash_sync_required(&full_hash[..4], 1_700).await.unwrap());
        assert!(storage.lookup_full_hash(&full_hash, 1_700).await.unwrap().is_empty());
    }
}
