//! The forest handle: versions, views and write transactions.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use alloy_primitives::B256;
use tracing::debug;
use urna_kv::{Store, StoreSnapshot};
use urna_tree::EMPTY_HASH;

use crate::{StateDbError, TreeTx, TreeView};

pub(crate) const META_VERSION_KEY: &[u8] = b"meta/version";
pub(crate) const META_ROOT_PREFIX: &[u8] = b"meta/root/";
pub(crate) const MAIN_PREFIX: &[u8] = b"main//";
pub(crate) const NOSTATE_PREFIX: &[u8] = b"nostate/";

pub(crate) fn versioned_root_key(version: u64) -> Vec<u8> {
    let mut key = META_ROOT_PREFIX.to_vec();
    key.extend_from_slice(&version.to_be_bytes());
    key
}

/// Handle to the authenticated forest.
///
/// The handle is cheap to clone; all clones share the underlying store
/// and the single-writer guard. Version 0 is the empty forest with a
/// zero root; the first commit produces version 1.
#[derive(Clone)]
pub struct StateDb {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    tx_open: AtomicBool,
}

impl std::fmt::Debug for StateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb").finish_non_exhaustive()
    }
}

impl StateDb {
    /// Wrap a key/value store as a forest.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { inner: Arc::new(Inner { store, tx_open: AtomicBool::new(false) }) }
    }

    /// The last committed version; 0 if nothing was ever committed.
    pub fn version(&self) -> Result<u64, StateDbError> {
        Self::version_at(self.inner.store.snapshot()?.as_ref())
    }

    pub(crate) fn version_at(snap: &dyn StoreSnapshot) -> Result<u64, StateDbError> {
        match snap.get(META_VERSION_KEY)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(buf))
            }
            Some(_) => Err(StateDbError::InvalidParentLeaf("corrupt version record".into())),
            None => Ok(0),
        }
    }

    /// The last committed main root; 32 zero bytes at version 0.
    pub fn hash(&self) -> Result<B256, StateDbError> {
        let snap = self.inner.store.snapshot()?;
        let version = Self::version_at(snap.as_ref())?;
        Self::root_at(snap.as_ref(), version)
    }

    pub(crate) fn root_at(snap: &dyn StoreSnapshot, version: u64) -> Result<B256, StateDbError> {
        if version == 0 {
            return Ok(EMPTY_HASH);
        }
        match snap.get(&versioned_root_key(version))? {
            Some(bytes) if bytes.len() == 32 => Ok(B256::from_slice(&bytes)),
            Some(_) => Err(StateDbError::InvalidParentLeaf("corrupt root record".into())),
            None => Err(StateDbError::VersionNotFound(version)),
        }
    }

    /// Open an immutable view of the forest.
    ///
    /// With `version = None` the view pins the latest committed version;
    /// otherwise it pins the requested one. Nodes are content-addressed
    /// and never rewritten, so a view stays byte-stable no matter how
    /// many commits happen after it was opened.
    pub fn tree_view(&self, version: Option<u64>) -> Result<TreeView, StateDbError> {
        let snap = self.inner.store.snapshot()?;
        let latest = Self::version_at(snap.as_ref())?;
        let version = match version {
            Some(v) if v > latest => return Err(StateDbError::VersionNotFound(v)),
            Some(v) => v,
            None => latest,
        };
        let root = Self::root_at(snap.as_ref(), version)?;
        Ok(TreeView::new(snap, version, root))
    }

    /// Open the exclusive write context.
    ///
    /// At most one `TreeTx` exists at a time; a second call fails with
    /// [`StateDbError::TxAlreadyOpen`] until the live one is committed,
    /// discarded or dropped.
    pub fn begin_tx(&self) -> Result<TreeTx, StateDbError> {
        if self
            .inner
            .tx_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StateDbError::TxAlreadyOpen);
        }
        match TreeTx::open(self.clone()) {
            Ok(tx) => Ok(tx),
            Err(e) => {
                self.inner.tx_open.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub(crate) fn release_tx(&self) {
        self.inner.tx_open.store(false, Ordering::Release);
    }

    pub(crate) fn log_commit(version: u64, root: &B256) {
        debug!(version, root = %root, "forest committed");
    }
}
