//! Error types for forest operations.

use thiserror::Error;
use urna_kv::KvError;
use urna_tree::TreeError;

/// Error type for forest operations.
#[derive(Debug, Error)]
pub enum StateDbError {
    /// Error from a tree algorithm; `KeyNotFound` / `KeyAlreadyExists`
    /// are recoverable, the rest are fatal.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Underlying key/value store failure. Fatal.
    #[error(transparent)]
    Kv(#[from] KvError),

    /// The requested version has never been committed.
    #[error("version {0} not found")]
    VersionNotFound(u64),

    /// A second write context was requested while one is live.
    #[error("a write transaction is already open")]
    TxAlreadyOpen,

    /// A sub-tree's parent leaf is missing: the instance was never
    /// created.
    #[error("subtree not found: {0}")]
    SubTreeNotFound(String),

    /// A parent leaf failed to decode through its root codec.
    #[error("invalid parent leaf: {0}")]
    InvalidParentLeaf(String),
}

impl StateDbError {
    /// Whether this error is a plain key-miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Tree(TreeError::KeyNotFound) | Self::SubTreeNotFound(_))
    }
}
