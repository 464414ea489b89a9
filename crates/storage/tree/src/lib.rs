//! Authenticated sparse Merkle tree for the state engine.
//!
//! The tree maps raw byte keys to raw byte values and commits to its
//! contents with a 32-byte root. It is parameterized by a hash function
//! and a maximum depth, so the same implementation backs both the
//! general-purpose SHA-256 trees and the SNARK-friendly Poseidon census
//! trees. Nodes are content-addressed: a [`Tree`] holds only
//! configuration, and every operation takes an explicit root plus a node
//! store handle, which is what lets a transactional forest layer stack an
//! overlay of pending nodes on top of a committed snapshot.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::TreeError;

mod hasher;
pub use hasher::{PoseidonHasher, Sha256Hasher, TreeHasher, EMPTY_HASH, HASH_LEN};

mod node;
pub use node::Node;

mod proof;
pub use proof::Proof;

mod tree;
pub use tree::{NodeRead, NodeWrite, Tree};
