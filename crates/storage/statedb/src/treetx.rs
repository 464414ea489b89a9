//! The exclusive write context over the forest.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::B256;
use urna_kv::StoreSnapshot;
use urna_tree::{Tree, TreeError};

use crate::{
    adapter::{OverlayNodes, OverlayNodesMut},
    config::{main_tree_config, RootCodec, TreeRef},
    statedb::{versioned_root_key, MAIN_PREFIX, META_VERSION_KEY, NOSTATE_PREFIX},
    StateDb, StateDbError,
};

/// One level of a resolved sub-tree path: everything needed to rewrite
/// the parent leaf when the child root changes.
struct Frame {
    tree: Tree,
    prefix: Vec<u8>,
    root: B256,
    leaf_key: Vec<u8>,
    leaf: Vec<u8>,
    codec: Arc<dyn RootCodec>,
}

struct Resolved {
    frames: Vec<Frame>,
    leaf_tree: Tree,
    leaf_prefix: Vec<u8>,
    leaf_root: B256,
}

/// The forest's exclusive write context.
///
/// All mutations of a block accumulate here as a pending overlay on top
/// of the committed snapshot taken when the context was opened. Nothing
/// is visible to views until [`commit`](Self::commit), which lands the
/// whole overlay as one atomic batch and advances the version. A deep
/// mutation rewrites exactly one parent leaf per enclosing level, so the
/// main root always commits to the state of every sub-tree.
pub struct TreeTx {
    sdb: StateDb,
    base: Arc<dyn StoreSnapshot>,
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
    version: u64,
    main_tree: Tree,
    main_root: B256,
}

impl TreeTx {
    pub(crate) fn open(sdb: StateDb) -> Result<Self, StateDbError> {
        let base = sdb.store().snapshot()?;
        let version = StateDb::version_at(base.as_ref())?;
        let main_root = StateDb::root_at(base.as_ref(), version)?;
        Ok(Self {
            sdb,
            base,
            pending: BTreeMap::new(),
            version,
            main_tree: main_tree_config().tree(),
            main_root,
        })
    }

    /// The working (uncommitted) main root.
    pub fn root(&self) -> B256 {
        self.main_root
    }

    /// Get a value from the main tree, pending writes included.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError> {
        let reader = OverlayNodes {
            pending: &self.pending,
            snap: &self.base,
            prefix: MAIN_PREFIX.to_vec(),
        };
        Ok(self.main_tree.get(&reader, &self.main_root, key)?)
    }

    /// Insert a new key into the main tree.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateDbError> {
        let mut writer = OverlayNodesMut {
            pending: &mut self.pending,
            snap: &self.base,
            prefix: MAIN_PREFIX.to_vec(),
        };
        self.main_root = self.main_tree.add(&mut writer, &self.main_root, key, value)?;
        Ok(())
    }

    /// Add-or-update a key in the main tree.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateDbError> {
        let mut writer = OverlayNodesMut {
            pending: &mut self.pending,
            snap: &self.base,
            prefix: MAIN_PREFIX.to_vec(),
        };
        self.main_root = self.main_tree.set(&mut writer, &self.main_root, key, value)?;
        Ok(())
    }

    /// Open a handle on a sub-tree hanging off the main tree.
    pub fn sub_tree(&mut self, subtree: TreeRef) -> Result<SubTreeTx<'_>, StateDbError> {
        self.deep_sub_tree(vec![subtree])
    }

    /// Open a handle on a nested sub-tree, resolving intermediate parent
    /// leaves along `path`.
    pub fn deep_sub_tree(&mut self, path: Vec<TreeRef>) -> Result<SubTreeTx<'_>, StateDbError> {
        // Resolve eagerly so a missing instance errors at open, not on
        // first use.
        self.resolve(&path)?;
        Ok(SubTreeTx { tx: self, path })
    }

    /// Append a new key into the sub-tree at `path`, propagating every
    /// enclosing root up to the main root.
    pub fn deep_add(
        &mut self,
        path: &[TreeRef],
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StateDbError> {
        self.deep_mutate(path, |tree, store, root| tree.add(store, root, key, value))
    }

    /// Add-or-update a key in the sub-tree at `path`, propagating every
    /// enclosing root up to the main root.
    pub fn deep_set(
        &mut self,
        path: &[TreeRef],
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StateDbError> {
        self.deep_mutate(path, |tree, store, root| tree.set(store, root, key, value))
    }

    /// Plain (non-Merkleized) keyspace sharing this context's atomicity.
    pub fn no_state(&mut self) -> NoStateTx<'_> {
        NoStateTx { tx: self }
    }

    /// Atomically persist all pending writes and advance the version.
    ///
    /// Returns the new `(version, main_root)` pair. The context is
    /// consumed; the caller opens a fresh one for subsequent writes.
    pub fn commit(mut self) -> Result<(u64, B256), StateDbError> {
        let version = self.version + 1;
        self.pending.insert(META_VERSION_KEY.to_vec(), version.to_be_bytes().to_vec());
        self.pending.insert(versioned_root_key(version), self.main_root.to_vec());

        let batch = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(key, value)| (key, Some(value)))
            .collect();
        self.sdb.store().write_batch(batch)?;
        StateDb::log_commit(version, &self.main_root);
        Ok((version, self.main_root))
    }

    /// Drop all pending writes.
    pub fn discard(self) {}

    fn resolve(&self, path: &[TreeRef]) -> Result<Resolved, StateDbError> {
        let mut tree = self.main_tree.clone();
        let mut prefix = MAIN_PREFIX.to_vec();
        let mut root = self.main_root;
        let mut frames = Vec::with_capacity(path.len());

        for subtree in path {
            let leaf_key = subtree.leaf_key();
            let reader =
                OverlayNodes { pending: &self.pending, snap: &self.base, prefix: prefix.clone() };
            let leaf = match tree.get(&reader, &root, &leaf_key) {
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
            let child_root = subtree.config.codec().get_root(&leaf)?;
            frames.push(Frame {
                tree,
                prefix: prefix.clone(),
                root,
                leaf_key,
                leaf,
                codec: Arc::clone(subtree.config.codec()),
            });
            tree = subtree.config.tree();
            prefix = subtree.prefix();
            root = child_root;
        }

        Ok(Resolved { frames, leaf_tree: tree, leaf_prefix: prefix, leaf_root: root })
    }

    fn deep_mutate(
        &mut self,
        path: &[TreeRef],
        op: impl FnOnce(&Tree, &mut dyn urna_tree::NodeWrite, &B256) -> Result<B256, TreeError>,
    ) -> Result<(), StateDbError> {
        let resolved = self.resolve(path)?;

        let mut writer = OverlayNodesMut {
            pending: &mut self.pending,
            snap: &self.base,
            prefix: resolved.leaf_prefix,
        };
        let mut new_root = op(&resolved.leaf_tree, &mut writer, &resolved.leaf_root)?;

        // One parent-leaf rewrite per level, innermost first.
        for frame in resolved.frames.iter().rev() {
            let new_leaf = frame.codec.set_root(&frame.leaf, &new_root)?;
            let mut writer = OverlayNodesMut {
                pending: &mut self.pending,
                snap: &self.base,
                prefix: frame.prefix.clone(),
            };
            new_root = frame.tree.set(&mut writer, &frame.root, &frame.leaf_key, &new_leaf)?;
        }
        self.main_root = new_root;
        Ok(())
    }
}

impl Drop for TreeTx {
    fn drop(&mut self) {
        self.sdb.release_tx();
    }
}

/// Handle on one sub-tree instance inside a live [`TreeTx`].
///
/// Reads see the pending overlay; writes go through the owning context
/// and propagate roots the same way the deep operations do.
pub struct SubTreeTx<'t> {
    tx: &'t mut TreeTx,
    path: Vec<TreeRef>,
}

impl SubTreeTx<'_> {
    /// Get a value from this sub-tree.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StateDbError> {
        let resolved = self.tx.resolve(&self.path)?;
        let reader = OverlayNodes {
            pending: &self.tx.pending,
            snap: &self.tx.base,
            prefix: resolved.leaf_prefix,
        };
        Ok(resolved.leaf_tree.get(&reader, &resolved.leaf_root, key)?)
    }

    /// The sub-tree's current root.
    pub fn root(&self) -> Result<B256, StateDbError> {
        Ok(self.tx.resolve(&self.path)?.leaf_root)
    }

    /// Insert a new key.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateDbError> {
        let path = self.path.clone();
        self.tx.deep_add(&path, key, value)
    }

    /// Add-or-update a key. An empty value tombstones it.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateDbError> {
        let path = self.path.clone();
        self.tx.deep_set(&path, key, value)
    }

    /// Visit every `(key, value)` pair in deterministic order. The
    /// visitor returns `true` to stop early.
    pub fn iterate(
        &self,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StateDbError> {
        let resolved = self.tx.resolve(&self.path)?;
        let reader = OverlayNodes {
            pending: &self.tx.pending,
            snap: &self.tx.base,
            prefix: resolved.leaf_prefix,
        };
        Ok(resolved.leaf_tree.iterate(&reader, &resolved.leaf_root, visitor)?)
    }
}

/// Plain keyspace access inside a live [`TreeTx`].
///
/// Entries here share the transaction's atomicity but do not contribute
/// to the main root; this keyspace carries auxiliary indexes that can be
/// rebuilt from the trees.
pub struct NoStateTx<'t> {
    tx: &'t mut TreeTx,
}

impl NoStateTx<'_> {
    fn full_key(key: &[u8]) -> Vec<u8> {
        let mut out = NOSTATE_PREFIX.to_vec();
        out.extend_from_slice(key);
        out
    }

    /// Get an entry, pending writes included.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateDbError> {
        let full = Self::full_key(key);
        if let Some(value) = self.tx.pending.get(&full) {
            return Ok(Some(value.clone()));
        }
        Ok(self.tx.base.get(&full)?)
    }

    /// Put an entry.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateDbError> {
        self.tx.pending.insert(Self::full_key(key), value.to_vec());
        Ok(())
    }
}
