//! Hash function capability used to parameterize trees.

use alloy_primitives::B256;
use ark_bn254::Fr;
use ark_ff::{BigInteger, One, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher as _};
use sha2::{Digest, Sha256};

use crate::TreeError;

/// Length in bytes of every node hash.
pub const HASH_LEN: usize = 32;

/// Hash of the empty subtree.
pub const EMPTY_HASH: B256 = B256::ZERO;

const LEAF_TAG: u8 = 0x00;
const BRANCH_TAG: u8 = 0x01;

/// An arity-2 hash function with a fixed 32-byte output.
///
/// The two implementations share one tree algorithm; which one a tree uses
/// is fixed by its configuration and must match across replicas, since the
/// resulting roots are compared by consensus.
pub trait TreeHasher: Send + Sync + std::fmt::Debug {
    /// Short stable identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Hash a leaf from its key and value.
    fn hash_leaf(&self, key: &[u8], value: &[u8]) -> Result<B256, TreeError>;

    /// Hash an internal node from its two children.
    fn hash_node(&self, left: &B256, right: &B256) -> Result<B256, TreeError>;
}

/// SHA-256 tree hash.
///
/// Leaves hash as `sha256(0x00 || key || value)` and branches as
/// `sha256(0x01 || left || right)`; the tag byte separates the two
/// domains. No padding is applied.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl TreeHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hash_leaf(&self, key: &[u8], value: &[u8]) -> Result<B256, TreeError> {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_TAG]);
        hasher.update(key);
        hasher.update(value);
        Ok(B256::from_slice(&hasher.finalize()))
    }

    fn hash_node(&self, left: &B256, right: &B256) -> Result<B256, TreeError> {
        let mut hasher = Sha256::new();
        hasher.update([BRANCH_TAG]);
        hasher.update(left.as_slice());
        hasher.update(right.as_slice());
        Ok(B256::from_slice(&hasher.finalize()))
    }
}

/// Poseidon tree hash over the BN254 scalar field.
///
/// Uses the circom parameter set. Leaves hash as `H(key, value, 1)` and
/// branches as `H(left, right)`, the iden3 layout census circuits prove
/// against.
/// Byte strings are interpreted as little-endian field elements; callers
/// must keep inputs inside the field (high byte zero), the hasher reduces
/// modulo the field order rather than rejecting.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseidonHasher;

fn fr_from_le(bytes: &[u8]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

fn fr_to_b256(element: Fr) -> B256 {
    let bytes = element.into_bigint().to_bytes_le();
    let mut out = [0u8; HASH_LEN];
    out[..bytes.len()].copy_from_slice(&bytes);
    B256::from(out)
}

impl TreeHasher for PoseidonHasher {
    fn name(&self) -> &'static str {
        "poseidon"
    }

    fn hash_leaf(&self, key: &[u8], value: &[u8]) -> Result<B256, TreeError> {
        let mut poseidon =
            Poseidon::<Fr>::new_circom(3).map_err(|e| TreeError::Hash(e.to_string()))?;
        let digest = poseidon
            .hash(&[fr_from_le(key), fr_from_le(value), Fr::one()])
            .map_err(|e| TreeError::Hash(e.to_string()))?;
        Ok(fr_to_b256(digest))
    }

    fn hash_node(&self, left: &B256, right: &B256) -> Result<B256, TreeError> {
        let mut poseidon =
            Poseidon::<Fr>::new_circom(2).map_err(|e| TreeError::Hash(e.to_string()))?;
        let digest = poseidon
            .hash(&[fr_from_le(left.as_slice()), fr_from_le(right.as_slice())])
            .map_err(|e| TreeError::Hash(e.to_string()))?;
        Ok(fr_to_b256(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_leaf_layout_is_tagged() {
        let hasher = Sha256Hasher;
        let got = hasher.hash_leaf(b"key", b"value").unwrap();

        let mut expected = Sha256::new();
        expected.update([0x00]);
        expected.update(b"key");
        expected.update(b"value");
        assert_eq!(got.as_slice(), expected.finalize().as_slice());
    }

    #[test]
    fn sha256_branch_layout_is_tagged() {
        let hasher = Sha256Hasher;
        let left = B256::repeat_byte(0x11);
        let right = B256::repeat_byte(0x22);
        let got = hasher.hash_node(&left, &right).unwrap();

        let mut expected = Sha256::new();
        expected.update([0x01]);
        expected.update(left.as_slice());
        expected.update(right.as_slice());
        assert_eq!(got.as_slice(), expected.finalize().as_slice());
    }

    #[test]
    fn sha256_leaf_and_branch_domains_differ() {
        let hasher = Sha256Hasher;
        let a = B256::repeat_byte(0x11);
        let b = B256::repeat_byte(0x22);
        let as_leaf = hasher.hash_leaf(a.as_slice(), b.as_slice()).unwrap();
        let as_branch = hasher.hash_node(&a, &b).unwrap();
        assert_ne!(as_leaf, as_branch);
    }

    #[test]
    fn poseidon_output_is_in_field() {
        let hasher = PoseidonHasher;
        let mut key = [0u8; 8];
        key[0] = 7;
        let mut value = [0u8; 32];
        value[..4].copy_from_slice(&[1, 2, 3, 4]);

        let digest = hasher.hash_leaf(&key, &value).unwrap();
        // A canonical BN254 element always has the top byte of its
        // little-endian encoding below the modulus high byte.
        assert!(digest.as_slice()[31] <= 0x30);
    }

    #[test]
    fn poseidon_is_deterministic() {
        let hasher = PoseidonHasher;
        let a = hasher.hash_node(&B256::repeat_byte(0x01), &B256::ZERO);
        let b = hasher.hash_node(&B256::repeat_byte(0x01), &B256::ZERO);
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
