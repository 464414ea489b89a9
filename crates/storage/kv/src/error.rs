//! Error types for storage operations.

use thiserror::Error;

/// Error type for key/value store operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// Backend-specific failure that has no structured representation.
    #[error("backend error: {0}")]
    Backend(String),

    /// Filesystem error while opening or creating the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Database open/create error.
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Table open error.
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    /// Transaction begin error.
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Write-batch commit error.
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Low-level storage error.
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
}
