//! Tree algorithms over a content-addressed node store.

use std::sync::Arc;

use alloy_primitives::B256;

use crate::{Node, Proof, TreeError, TreeHasher, EMPTY_HASH};

/// Read access to stored nodes, addressed by hash.
pub trait NodeRead {
    /// Fetch the record stored under `hash`, if any.
    fn get_node(&self, hash: &B256) -> Result<Option<Vec<u8>>, TreeError>;
}

/// Write access to stored nodes.
pub trait NodeWrite: NodeRead {
    /// Store `bytes` under `hash`. Records are content-addressed, so
    /// re-storing an existing hash is a no-op for the tree's semantics.
    fn put_node(&mut self, hash: B256, bytes: Vec<u8>) -> Result<(), TreeError>;
}

/// Sparse Merkle tree configuration.
///
/// The struct holds no node data; every operation takes the current root
/// and a store handle, and mutating operations return the new root. Two
/// replicas applying the same operations through the same configuration
/// produce byte-identical roots regardless of platform.
#[derive(Clone, Debug)]
pub struct Tree {
    hasher: Arc<dyn TreeHasher>,
    max_levels: usize,
}

impl Tree {
    /// Create a tree configuration from a hash function and maximum depth.
    pub fn new(hasher: Arc<dyn TreeHasher>, max_levels: usize) -> Self {
        Self { hasher, max_levels }
    }

    /// The hash function this tree uses.
    pub fn hasher(&self) -> &Arc<dyn TreeHasher> {
        &self.hasher
    }

    /// Maximum depth in levels (bits of key path).
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    fn check_key(&self, key: &[u8]) -> Result<(), TreeError> {
        if key.is_empty() || key.len() * 8 > self.max_levels {
            return Err(TreeError::InvalidKeySize {
                got: key.len(),
                max_levels: self.max_levels,
            });
        }
        Ok(())
    }

    fn decode_node(&self, bytes: Option<Vec<u8>>, hash: &B256) -> Result<Node, TreeError> {
        let bytes =
            bytes.ok_or_else(|| TreeError::CorruptNode(format!("missing node {hash}")))?;
        Node::decode(&bytes)
    }

    fn write_leaf(
        &self,
        store: &mut dyn NodeWrite,
        key: &[u8],
        value: &[u8],
    ) -> Result<B256, TreeError> {
        let hash = self.hasher.hash_leaf(key, value)?;
        let node = Node::Leaf { key: key.to_vec(), value: value.to_vec() };
        store.put_node(hash, node.encode())?;
        Ok(hash)
    }

    fn write_branch(
        &self,
        store: &mut dyn NodeWrite,
        left: B256,
        right: B256,
    ) -> Result<B256, TreeError> {
        let hash = self.hasher.hash_node(&left, &right)?;
        store.put_node(hash, Node::Branch { left, right }.encode())?;
        Ok(hash)
    }

    /// Insert a new key. Fails with [`TreeError::KeyAlreadyExists`] if the
    /// key is present (even as a tombstone). Returns the new root.
    pub fn add(
        &self,
        store: &mut dyn NodeWrite,
        root: &B256,
        key: &[u8],
        value: &[u8],
    ) -> Result<B256, TreeError> {
        self.check_key(key)?;
        self.upsert(store, *root, key, value, 0, false)
    }

    /// Replace the value of an existing key. Fails with
    /// [`TreeError::KeyNotFound`] if the key is absent. Returns the new
    /// root.
    pub fn update(
        &self,
        store: &mut dyn NodeWrite,
        root: &B256,
        key: &[u8],
        value: &[u8],
    ) -> Result<B256, TreeError> {
        self.check_key(key)?;
        self.replace(store, *root, key, value, 0)
    }

    /// Add-or-update. An empty `value` acts as a tombstone: the leaf stays
    /// in the tree so removals remain auditable and the key-set stable.
    pub fn set(
        &self,
        store: &mut dyn NodeWrite,
        root: &B256,
        key: &[u8],
        value: &[u8],
    ) -> Result<B256, TreeError> {
        self.check_key(key)?;
        self.upsert(store, *root, key, value, 0, true)
    }

    /// Get the value stored under `key`.
    pub fn get(
        &self,
        store: &dyn NodeRead,
        root: &B256,
        key: &[u8],
    ) -> Result<Vec<u8>, TreeError> {
        self.check_key(key)?;
        let mut current = *root;
        for level in 0..=self.max_levels {
            if current == EMPTY_HASH {
                return Err(TreeError::KeyNotFound);
            }
            match self.decode_node(store.get_node(&current)?, &current)? {
                Node::Leaf { key: leaf_key, value } => {
                    if leaf_key == key {
                        return Ok(value);
                    }
                    return Err(TreeError::KeyNotFound);
                }
                Node::Branch { left, right } => {
                    current = if path_bit(key, level) { right } else { left };
                }
            }
        }
        Err(TreeError::MaxLevelsReached(self.max_levels))
    }

    /// Visit every `(key, value)` pair in deterministic depth-first order
    /// (left child before right). The visitor returns `true` to stop
    /// early.
    pub fn iterate(
        &self,
        store: &dyn NodeRead,
        root: &B256,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), TreeError> {
        self.walk(store, root, visitor)?;
        Ok(())
    }

    fn walk(
        &self,
        store: &dyn NodeRead,
        node: &B256,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<bool, TreeError> {
        if *node == EMPTY_HASH {
            return Ok(false);
        }
        match self.decode_node(store.get_node(node)?, node)? {
            Node::Leaf { key, value } => Ok(visitor(&key, &value)),
            Node::Branch { left, right } => {
                if self.walk(store, &left, visitor)? {
                    return Ok(true);
                }
                self.walk(store, &right, visitor)
            }
        }
    }

    /// Produce the stored value (empty when absent) and an
    /// inclusion/exclusion proof for `key`.
    pub fn proof(
        &self,
        store: &dyn NodeRead,
        root: &B256,
        key: &[u8],
    ) -> Result<(Vec<u8>, Proof), TreeError> {
        self.check_key(key)?;
        let mut siblings = Vec::new();
        let mut current = *root;
        for level in 0..=self.max_levels {
            if current == EMPTY_HASH {
                return Ok((Vec::new(), Proof { existence: false, siblings, aux: None }));
            }
            match self.decode_node(store.get_node(&current)?, &current)? {
                Node::Leaf { key: leaf_key, value } => {
                    if leaf_key == key {
                        return Ok((
                            value,
                            Proof { existence: true, siblings, aux: None },
                        ));
                    }
                    // A different leaf on the path proves the key absent.
                    return Ok((
                        Vec::new(),
                        Proof { existence: false, siblings, aux: Some((leaf_key, value)) },
                    ));
                }
                Node::Branch { left, right } => {
                    if path_bit(key, level) {
                        siblings.push(left);
                        current = right;
                    } else {
                        siblings.push(right);
                        current = left;
                    }
                }
            }
        }
        Err(TreeError::MaxLevelsReached(self.max_levels))
    }

    fn upsert(
        &self,
        store: &mut dyn NodeWrite,
        node: B256,
        key: &[u8],
        value: &[u8],
        level: usize,
        overwrite: bool,
    ) -> Result<B256, TreeError> {
        if level > self.max_levels {
            return Err(TreeError::MaxLevelsReached(self.max_levels));
        }
        if node == EMPTY_HASH {
            return self.write_leaf(store, key, value);
        }
        match self.decode_node(store.get_node(&node)?, &node)? {
            Node::Leaf { key: leaf_key, value: leaf_value } => {
                if leaf_key == key {
                    if !overwrite {
                        return Err(TreeError::KeyAlreadyExists);
                    }
                    return self.write_leaf(store, key, value);
                }
                self.split(store, (&leaf_key, &leaf_value), (key, value), level)
            }
            Node::Branch { left, right } => {
                if path_bit(key, level) {
                    let new_right = self.upsert(store, right, key, value, level + 1, overwrite)?;
                    self.write_branch(store, left, new_right)
                } else {
                    let new_left = self.upsert(store, left, key, value, level + 1, overwrite)?;
                    self.write_branch(store, new_left, right)
                }
            }
        }
    }

    /// Push two colliding leaves down until their paths diverge.
    fn split(
        &self,
        store: &mut dyn NodeWrite,
        existing: (&[u8], &[u8]),
        new: (&[u8], &[u8]),
        level: usize,
    ) -> Result<B256, TreeError> {
        if level >= self.max_levels {
            return Err(TreeError::MaxLevelsReached(self.max_levels));
        }
        let existing_bit = path_bit(existing.0, level);
        let new_bit = path_bit(new.0, level);
        if existing_bit != new_bit {
            let existing_hash = self.write_leaf(store, existing.0, existing.1)?;
            let new_hash = self.write_leaf(store, new.0, new.1)?;
            let (left, right) = if new_bit {
                (existing_hash, new_hash)
            } else {
                (new_hash, existing_hash)
            };
            return self.write_branch(store, left, right);
        }
        let child = self.split(store, existing, new, level + 1)?;
        let (left, right) = if existing_bit { (EMPTY_HASH, child) } else { (child, EMPTY_HASH) };
        self.write_branch(store, left, right)
    }

    fn replace(
        &self,
        store: &mut dyn NodeWrite,
        node: B256,
        key: &[u8],
        value: &[u8],
        level: usize,
    ) -> Result<B256, TreeError> {
        if level > self.max_levels {
            return Err(TreeError::MaxLevelsReached(self.max_levels));
        }
        if node == EMPTY_HASH {
            return Err(TreeError::KeyNotFound);
        }
        match self.decode_node(store.get_node(&node)?, &node)? {
            Node::Leaf { key: leaf_key, .. } => {
                if leaf_key != key {
                    return Err(TreeError::KeyNotFound);
                }
                self.write_leaf(store, key, value)
            }
            Node::Branch { left, right } => {
                if path_bit(key, level) {
                    let new_right = self.replace(store, right, key, value, level + 1)?;
                    self.write_branch(store, left, new_right)
                } else {
                    let new_left = self.replace(store, left, key, value, level + 1)?;
                    self.write_branch(store, new_left, right)
                }
            }
        }
    }
}

/// Bit `level` of the key path; bit *i* is `(key[i/8] >> (i%8)) & 1`.
/// Levels beyond the key length read as zero.
pub(crate) fn path_bit(key: &[u8], level: usize) -> bool {
    key.get(level / 8).is_some_and(|byte| (byte >> (level % 8)) & 1 == 1)
}
