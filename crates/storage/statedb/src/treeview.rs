//! Immutable committed views of the forest.

use std::sync::Arc;

use alloy_primitives::B256;
use urna_kv::StoreSnapshot;
use urna_tree::{Proof, Tree, TreeError};

use crate::{
    adapter::SnapshotNodes,
    config::{main_tree_config, TreeRef},
    statedb::{MAIN_PREFIX, NOSTATE_PREFIX},
    StateDbError,
};

/// A read-only snapshot of the forest pinned at a committed version.
///
/// Views are safe to share across threads and keep returning the exact
/// state of their version regardless of later commits: tree nodes are
/// content-addressed (never rewritten) and the underlying snapshot is an
/// MVCC read view.
pub struct TreeView {
    snap: Arc<dyn StoreSnapshot>,
    version: u64,
    root: B256,
    main_tree: Tree,
}

impl std::fmt::Debug for TreeView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeView")
            .field("version", &self.version)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl TreeView {
    pub(crate) fn new(snap: Arc<dyn StoreSnapshot>, version: u64, root: B256) -> Self {
        Self { snap, version, root, main_tree: main_tree_config().tree() }
    }

    /// The version this view is pinned at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The main root at this version.
    pub fn root(&self) -> B256 {
        self.root
    }

    /// Get a value from the main tree.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError> {
        let reader = SnapshotNodes { snap: &self.snap, prefix: MAIN_PREFIX.to_vec() };
        Ok(self.main_tree.get(&reader, &self.root, key)?)
    }

    /// Open a read handle on a sub-tree hanging off the main tree.
    pub fn sub_tree(&self, subtree: TreeRef) -> Result<SubTreeView<'_>, StateDbError> {
        self.deep_sub_tree(vec![subtree])
    }

    /// Open a read handle on a nested sub-tree along `path`.
    pub fn deep_sub_tree(&self, path: Vec<TreeRef>) -> Result<SubTreeView<'_>, StateDbError> {
        let mut tree = self.main_tree.clone();
        let mut prefix = MAIN_PREFIX.to_vec();
        let mut root = self.root;

        for subtree in &path {
            let reader = SnapshotNodes { snap: &self.snap, prefix: prefix.clone() };
            let leaf = match tree.get(&reader, &root, &subtree.leaf_key()) {
                Ok(leaf) => leaf,
                Err(TreeError::KeyNotFound) => {
                    return Err(StateDbError::SubTreeNotFound(format!(
                        "{}/{}",
                        subtree.config.kind_id(),
                        alloy_primitives::hex::encode(&subtree.instance),
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            root = subtree.config.codec().get_root(&leaf)?;
            tree = subtree.config.tree();
            prefix = subtree.prefix();
        }

        Ok(SubTreeView { view: self, tree, prefix, root })
    }

    /// Plain keyspace access at this version.
    pub fn no_state(&self) -> NoStateView<'_> {
        NoStateView { view: self }
    }
}

/// Read handle on one sub-tree instance of a [`TreeView`].
pub struct SubTreeView<'v> {
    view: &'v TreeView,
    tree: Tree,
    prefix: Vec<u8>,
    root: B256,
}

impl SubTreeView<'_> {
    /// The sub-tree's root at the view's version.
    pub fn root(&self) -> B256 {
        self.root
    }

    /// Get a value from this sub-tree.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError> {
        let reader = SnapshotNodes { snap: &self.view.snap, prefix: self.prefix.clone() };
        Ok(self.tree.get(&reader, &self.root, key)?)
    }

    /// Visit every `(key, value)` pair in deterministic order. The
    /// visitor returns `true` to stop early.
    pub fn iterate(
        &self,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StateDbError> {
        let reader = SnapshotNodes { snap: &self.view.snap, prefix: self.prefix.clone() };
        Ok(self.tree.iterate(&reader, &self.root, visitor)?)
    }

    /// Produce the stored value and an inclusion/exclusion proof for
    /// `key`, verifiable against [`root`](Self::root).
    pub fn proof(&self, key: &[u8]) -> Result<(Vec<u8>, Proof), StateDbError> {
        let reader = SnapshotNodes { snap: &self.view.snap, prefix: self.prefix.clone() };
        Ok(self.tree.proof(&reader, &self.root, key)?)
    }
}

/// Plain keyspace reads at a committed version.
pub struct NoStateView<'v> {
    view: &'v TreeView,
}

impl NoStateView<'_> {
    /// Get an entry from the plain keyspace.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateDbError> {
        let mut full = NOSTATE_PREFIX.to_vec();
        full.extend_from_slice(key);
        Ok(self.view.snap.get(&full)?)
    }
}
