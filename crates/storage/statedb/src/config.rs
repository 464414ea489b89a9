//! Sub-tree configuration and parent-leaf root codecs.

use std::sync::Arc;

use alloy_primitives::B256;
use urna_tree::{Sha256Hasher, Tree, TreeHasher, HASH_LEN};

use crate::StateDbError;

/// Decodes and re-encodes the child root embedded in a parent leaf value.
///
/// Singleton sub-trees use [`RootLeafCodec`] (the leaf *is* the root);
/// non-singleton sub-trees supply a codec that rewrites the designated
/// field of a structured record.
pub trait RootCodec: Send + Sync + std::fmt::Debug {
    /// Extract the child root from the parent leaf value.
    fn get_root(&self, parent_leaf: &[u8]) -> Result<B256, StateDbError>;

    /// Rewrite the parent leaf value with a new child root.
    fn set_root(&self, parent_leaf: &[u8], root: &B256) -> Result<Vec<u8>, StateDbError>;
}

/// Codec for parent leaves that hold nothing but the 32-byte child root.
#[derive(Clone, Copy, Debug, Default)]
pub struct RootLeafCodec;

impl RootCodec for RootLeafCodec {
    fn get_root(&self, parent_leaf: &[u8]) -> Result<B256, StateDbError> {
        if parent_leaf.len() != HASH_LEN {
            return Err(StateDbError::InvalidParentLeaf(format!(
                "expected {HASH_LEN} bytes, got {}",
                parent_leaf.len()
            )));
        }
        Ok(B256::from_slice(parent_leaf))
    }

    fn set_root(&self, parent_leaf: &[u8], root: &B256) -> Result<Vec<u8>, StateDbError> {
        if parent_leaf.len() != HASH_LEN {
            return Err(StateDbError::InvalidParentLeaf(format!(
                "expected {HASH_LEN} bytes, got {}",
                parent_leaf.len()
            )));
        }
        Ok(root.to_vec())
    }
}

/// Static description of a sub-tree family.
#[derive(Clone, Debug)]
pub struct TreeConfig {
    kind_id: &'static str,
    hasher: Arc<dyn TreeHasher>,
    max_levels: usize,
    singleton: bool,
    codec: Arc<dyn RootCodec>,
}

impl TreeConfig {
    /// Configuration for a singleton sub-tree: one instance, living under
    /// a fixed parent leaf keyed by `kind_id`.
    pub fn singleton(
        kind_id: &'static str,
        hasher: Arc<dyn TreeHasher>,
        max_levels: usize,
        codec: Arc<dyn RootCodec>,
    ) -> Self {
        Self { kind_id, hasher, max_levels, singleton: true, codec }
    }

    /// Configuration for a keyed sub-tree family: one instance per parent
    /// leaf, keyed by the instance key.
    pub fn non_singleton(
        kind_id: &'static str,
        hasher: Arc<dyn TreeHasher>,
        max_levels: usize,
        codec: Arc<dyn RootCodec>,
    ) -> Self {
        Self { kind_id, hasher, max_levels, singleton: false, codec }
    }

    /// The kind identifier; also the parent leaf key of singletons.
    pub fn kind_id(&self) -> &'static str {
        self.kind_id
    }

    /// Whether this family has exactly one instance.
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// The root codec for parent leaves of this family.
    pub fn codec(&self) -> &Arc<dyn RootCodec> {
        &self.codec
    }

    /// Build the tree algorithm for this configuration.
    pub fn tree(&self) -> Tree {
        Tree::new(Arc::clone(&self.hasher), self.max_levels)
    }

    /// Reference the single instance of a singleton family.
    pub fn singleton_ref(&self) -> TreeRef {
        debug_assert!(self.singleton);
        TreeRef { config: self.clone(), instance: Vec::new() }
    }

    /// Reference the instance of this family under `instance_key`.
    pub fn with_key(&self, instance_key: impl Into<Vec<u8>>) -> TreeRef {
        debug_assert!(!self.singleton);
        TreeRef { config: self.clone(), instance: instance_key.into() }
    }
}

/// A concrete sub-tree instance: a configuration plus an instance key.
#[derive(Clone, Debug)]
pub struct TreeRef {
    /// The family configuration.
    pub config: TreeConfig,
    /// The instance key; empty for singletons.
    pub instance: Vec<u8>,
}

impl TreeRef {
    /// The key of this instance's parent leaf.
    pub fn leaf_key(&self) -> Vec<u8> {
        if self.config.is_singleton() {
            self.config.kind_id().as_bytes().to_vec()
        } else {
            self.instance.clone()
        }
    }

    /// The KV namespace prefix of this instance's nodes:
    /// `<kind>/<instance>/`.
    pub fn prefix(&self) -> Vec<u8> {
        let kind = self.config.kind_id().as_bytes();
        let mut out = Vec::with_capacity(kind.len() + self.instance.len() + 2);
        out.extend_from_slice(kind);
        out.push(b'/');
        out.extend_from_slice(&self.instance);
        out.push(b'/');
        out
    }
}

/// Configuration of the main tree that anchors the forest.
pub fn main_tree_config() -> TreeConfig {
    TreeConfig::singleton("main", Arc::new(Sha256Hasher), 256, Arc::new(RootLeafCodec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_leaf_codec_passes_roots_through() {
        let codec = RootLeafCodec;
        let root = B256::repeat_byte(0x42);
        let leaf = vec![0u8; 32];

        assert_eq!(codec.get_root(&leaf).unwrap(), B256::ZERO);
        let rewritten = codec.set_root(&leaf, &root).unwrap();
        assert_eq!(codec.get_root(&rewritten).unwrap(), root);
    }

    #[test]
    fn root_leaf_codec_rejects_wrong_length() {
        let codec = RootLeafCodec;
        assert!(codec.get_root(&[1, 2, 3]).is_err());
        assert!(codec.set_root(&[1, 2, 3], &B256::ZERO).is_err());
    }

    #[test]
    fn prefixes_are_collision_free_per_instance() {
        let cfg = TreeConfig::non_singleton(
            "votes",
            Arc::new(Sha256Hasher),
            256,
            Arc::new(RootLeafCodec),
        );
        let a = cfg.with_key(vec![0x01; 32]).prefix();
        let b = cfg.with_key(vec![0x02; 32]).prefix();
        assert_ne!(a, b);
        assert!(a.starts_with(b"votes/"));
    }
}
