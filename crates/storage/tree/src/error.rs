//! Error types for tree operations.

use thiserror::Error;
use urna_kv::KvError;

/// Error type for Merkle tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The key is not present in the tree.
    #[error("key not found")]
    KeyNotFound,

    /// An `add` hit a key that is already present.
    #[error("key already exists")]
    KeyAlreadyExists,

    /// The key does not fit within the tree's maximum depth.
    #[error("invalid key size: {got} bytes does not fit in {max_levels} levels")]
    InvalidKeySize {
        /// Size of the offending key in bytes.
        got: usize,
        /// Maximum depth of the tree in bits.
        max_levels: usize,
    },

    /// Insertion ran out of depth while splitting colliding leaves.
    #[error("maximum tree depth of {0} levels reached")]
    MaxLevelsReached(usize),

    /// A stored node failed to decode, or a branch references a node that
    /// is not in the store. Fatal: the caller must not keep operating on
    /// this tree.
    #[error("corrupt node: {0}")]
    CorruptNode(String),

    /// The hash function rejected its input.
    #[error("hash error: {0}")]
    Hash(String),

    /// Underlying key/value store failure. Fatal.
    #[error(transparent)]
    Kv(#[from] KvError),
}
