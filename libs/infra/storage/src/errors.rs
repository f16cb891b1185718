use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database: {0}")]
    Connection(String),
    #[error("schema migration failed: {0}")]
    Schema(String),
    #[error("database query failed: {0}")]
    Query(#[from] libsql::Error),
    #[error("failed to map a stored row: {0}")]
    Mapping(String),
    #[error("transaction failed to commit: {0}")]
    Transaction(String),
}
