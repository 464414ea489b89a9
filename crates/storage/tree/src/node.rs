//! Node records and their storage encoding.

use alloy_primitives::B256;

use crate::{TreeError, HASH_LEN};

const LEAF_TAG: u8 = 0x00;
const BRANCH_TAG: u8 = 0x01;

/// A stored tree node.
///
/// Nodes are content-addressed: the storage key of a node is its hash, so
/// a record is never overwritten with different content and historical
/// roots stay readable after later commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// A terminal node holding a full key and its value.
    Leaf {
        /// The full key, not just the suffix below the leaf's position.
        key: Vec<u8>,
        /// The raw value; empty values are tombstones and stay in the tree.
        value: Vec<u8>,
    },
    /// An internal node with two children; `EMPTY_HASH` marks an absent
    /// child.
    Branch {
        /// Hash of the left child.
        left: B256,
        /// Hash of the right child.
        right: B256,
    },
}

impl Node {
    /// Encode the node to its storage record.
    ///
    /// Leaf: `0x00 || key-len (u16 LE) || key || value`.
    /// Branch: `0x01 || left || right`.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Leaf { key, value } => {
                let mut out = Vec::with_capacity(3 + key.len() + value.len());
                out.push(LEAF_TAG);
                out.extend_from_slice(&(key.len() as u16).to_le_bytes());
                out.extend_from_slice(key);
                out.extend_from_slice(value);
                out
            }
            Self::Branch { left, right } => {
                let mut out = Vec::with_capacity(1 + 2 * HASH_LEN);
                out.push(BRANCH_TAG);
                out.extend_from_slice(left.as_slice());
                out.extend_from_slice(right.as_slice());
                out
            }
        }
    }

    /// Decode a storage record.
    pub fn decode(bytes: &[u8]) -> Result<Self, TreeError> {
        match bytes.first() {
            Some(&LEAF_TAG) => {
                if bytes.len() < 3 {
                    return Err(TreeError::CorruptNode("leaf record too short".into()));
                }
                let key_len = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
                if bytes.len() < 3 + key_len {
                    return Err(TreeError::CorruptNode("leaf key truncated".into()));
                }
                Ok(Self::Leaf {
                    key: bytes[3..3 + key_len].to_vec(),
                    value: bytes[3 + key_len..].to_vec(),
                })
            }
            Some(&BRANCH_TAG) => {
                if bytes.len() != 1 + 2 * HASH_LEN {
                    return Err(TreeError::CorruptNode("branch record malformed".into()));
                }
                Ok(Self::Branch {
                    left: B256::from_slice(&bytes[1..1 + HASH_LEN]),
                    right: B256::from_slice(&bytes[1 + HASH_LEN..]),
                })
            }
            Some(tag) => Err(TreeError::CorruptNode(format!("unknown node tag {tag:#04x}"))),
            None => Err(TreeError::CorruptNode("empty node record".into())),
        }
    }
}
