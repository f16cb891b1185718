//! Idempotent `CREATE TABLE IF NOT EXISTS` schema, applied once per
//! connection at [`crate::Storage::connect`] time (spec §4.8).

use libsql::Connection;
use tracing::debug;

use crate::errors::StorageError;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS chunk (
        list_name TEXT NOT NULL,
        chunk_number INTEGER NOT NULL,
        chunk_type TEXT NOT NULL,
        PRIMARY KEY (list_name, chunk_number, chunk_type)
    )",
    "CREATE TABLE IF NOT EXISTS hash_prefix (
        list_name TEXT NOT NULL,
        chunk_number INTEGER NOT NULL,
        chunk_type TEXT NOT NULL,
        prefix_length INTEGER NOT NULL,
        value BLOB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_hash_prefix_value ON hash_prefix(value)",
    "CREATE INDEX IF NOT EXISTS idx_hash_prefix_chunk ON hash_prefix(list_name, chunk_number, chunk_type)",
    "CREATE TABLE IF NOT EXISTS full_hash (
        list_name TEXT NOT NULL,
        value BLOB NOT NULL,
        metadata INTEGER,
        expires_at INTEGER NOT NULL,
        PRIMARY KEY (list_name, value)
    )",
    "CREATE TABLE IF NOT EXISTS sub_reference (
        list_name TEXT NOT NULL,
        add_chunk_number INTEGER NOT NULL
    )",
];

pub async fn apply(connection: &Connection) -> Result<(), StorageError> {
    for statement in STATEMENTS {
        connection
            .execute(statement, ())
            .await
            .map_err(|e| StorageError::Schema(e.to_string()))?;
    }
    debug!("storage schema is up to date");
    Ok(())
}
