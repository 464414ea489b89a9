//! Storage traits for consensus-critical state.

use std::sync::Arc;

use crate::KvError;

/// An ordered list of put/delete operations applied as one atomic unit.
///
/// A `Some(value)` entry is a put, a `None` entry is a delete. The batch
/// either lands completely or not at all; a crash mid-commit leaves the
/// prior contents intact.
pub type WriteBatch = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// An embedded ordered byte-key store.
///
/// This is the only interface the state engine has to persistent storage.
/// Implementations must apply [`write_batch`](Self::write_batch)
/// atomically and serve [`snapshot`](Self::snapshot) reads from a stable
/// point in time.
pub trait Store: Send + Sync + 'static {
    /// Get the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Apply a batch of writes atomically.
    fn write_batch(&self, ops: WriteBatch) -> Result<(), KvError>;

    /// Open a point-in-time snapshot of the current contents.
    ///
    /// Reads through the snapshot are unaffected by batches committed
    /// after it was opened.
    fn snapshot(&self) -> Result<Arc<dyn StoreSnapshot>, KvError>;
}

/// A point-in-time read view of a [`Store`].
pub trait StoreSnapshot: Send + Sync {
    /// Get the value stored under `key` at the snapshot's point in time.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;
}
