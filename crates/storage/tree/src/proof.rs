//! Inclusion and exclusion proofs.

use alloy_primitives::B256;

use crate::{tree::path_bit, TreeHasher, EMPTY_HASH};

/// A Merkle proof for a single key.
///
/// An inclusion proof commits to the key's value; an exclusion proof shows
/// either an empty slot at the key's path or a different leaf occupying
/// it. Proofs carry no tree state and verify against a bare root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    /// Whether the proof asserts the key is present.
    pub existence: bool,
    /// Sibling hashes along the path, root side first.
    pub siblings: Vec<B256>,
    /// For exclusion proofs: the different leaf found on the key's path,
    /// if the slot was not empty.
    pub aux: Option<(Vec<u8>, Vec<u8>)>,
}

impl Proof {
    /// Verify the proof against `root` for `(key, value)`.
    ///
    /// For exclusion proofs `value` must be empty. Returns `false` on any
    /// mismatch; verification never errors.
    pub fn verify(&self, hasher: &dyn TreeHasher, root: &B256, key: &[u8], value: &[u8]) -> bool {
        let mut current = if self.existence {
            match hasher.hash_leaf(key, value) {
                Ok(hash) => hash,
                Err(_) => return false,
            }
        } else if let Some((aux_key, aux_value)) = &self.aux {
            // The occupying leaf must be a different key on the same path
            // prefix, otherwise this is not an exclusion.
            if aux_key == key || !value.is_empty() {
                return false;
            }
            match hasher.hash_leaf(aux_key, aux_value) {
                Ok(hash) => hash,
                Err(_) => return false,
            }
        } else {
            if !value.is_empty() {
                return false;
            }
            EMPTY_HASH
        };

        for (level, sibling) in self.siblings.iter().enumerate().rev() {
            let combined = if path_bit(key, level) {
                hasher.hash_node(sibling, &current)
            } else {
                hasher.hash_node(&current, sibling)
            };
            current = match combined {
                Ok(hash) => hash,
                Err(_) => return false,
            };
        }
        current == *root
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{NodeRead, NodeWrite, Sha256Hasher, Tree, TreeError};

    #[derive(Default)]
    struct MemNodes {
        nodes: HashMap<B256, Vec<u8>>,
    }

    impl NodeRead for MemNodes {
        fn get_node(&self, hash: &B256) -> Result<Option<Vec<u8>>, TreeError> {
            Ok(self.nodes.get(hash).cloned())
        }
    }

    impl NodeWrite for MemNodes {
        fn put_node(&mut self, hash: B256, bytes: Vec<u8>) -> Result<(), TreeError> {
            self.nodes.insert(hash, bytes);
            Ok(())
        }
    }

    fn populated_tree() -> (Tree, MemNodes, B256, Vec<[u8; 32]>) {
        let tree = Tree::new(Arc::new(Sha256Hasher), 256);
        let mut store = MemNodes::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut root = crate::EMPTY_HASH;
        let mut keys = Vec::new();
        for _ in 0..48 {
            let key: [u8; 32] = rng.gen();
            root = tree.add(&mut store, &root, &key, key.as_slice()).unwrap();
            keys.push(key);
        }
        (tree, store, root, keys)
    }

    #[test]
    fn inclusion_proofs_verify_for_all_keys() {
        let (tree, store, root, keys) = populated_tree();
        for key in &keys {
            let (value, proof) = tree.proof(&store, &root, key).unwrap();
            assert!(proof.existence);
            assert_eq!(value, key.as_slice());
            assert!(proof.verify(tree.hasher().as_ref(), &root, key, &value));
        }
    }

    #[test]
    fn exclusion_proof_verifies_for_absent_key() {
        let (tree, store, root, keys) = populated_tree();
        let mut absent = keys[0];
        absent[31] ^= 0xFF;

        let (value, proof) = tree.proof(&store, &root, &absent).unwrap();
        assert!(!proof.existence);
        assert!(value.is_empty());
        assert!(proof.verify(tree.hasher().as_ref(), &root, &absent, &[]));
    }

    #[test]
    fn proof_rejects_wrong_value() {
        let (tree, store, root, keys) = populated_tree();
        let (_, proof) = tree.proof(&store, &root, &keys[0]).unwrap();
        assert!(!proof.verify(tree.hasher().as_ref(), &root, &keys[0], b"forged"));
    }

    #[test]
    fn proof_rejects_wrong_root() {
        let (tree, store, root, keys) = populated_tree();
        let (value, proof) = tree.proof(&store, &root, &keys[0]).unwrap();
        let wrong_root = B256::repeat_byte(0x99);
        assert!(!proof.verify(tree.hasher().as_ref(), &wrong_root, &keys[0], &value));
    }

    #[test]
    fn exclusion_proof_rejects_nonempty_value() {
        let (tree, store, root, keys) = populated_tree();
        let mut absent = keys[0];
        absent[31] ^= 0xFF;
        let (_, proof) = tree.proof(&store, &root, &absent).unwrap();
        assert!(!proof.verify(tree.hasher().as_ref(), &root, &absent, b"value"));
    }

    #[test]
    fn empty_tree_gives_empty_exclusion() {
        let tree = Tree::new(Arc::new(Sha256Hasher), 256);
        let store = MemNodes::default();
        let (value, proof) = tree.proof(&store, &crate::EMPTY_HASH, b"anything").unwrap();
        assert!(!proof.existence);
        assert!(value.is_empty());
        assert!(proof.siblings.is_empty());
        assert!(proof.verify(tree.hasher().as_ref(), &crate::EMPTY_HASH, b"anything", &[]));
    }
}
