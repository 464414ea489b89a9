//! Hierarchical authenticated forest over a key/value store.
//!
//! A [`StateDb`] manages a main Merkle tree plus named sub-trees whose
//! roots are embedded in their parent's leaf values, so one 32-byte main
//! root commits to the whole forest. All writes go through a single
//! exclusive [`TreeTx`]; committed state is read through immutable
//! [`TreeView`] snapshots pinned at a version. Sub-tree nodes are
//! namespaced by `(kind, instance)` so instances can never collide in the
//! underlying store.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod adapter;

mod config;
pub use config::{main_tree_config, RootCodec, RootLeafCodec, TreeConfig, TreeRef};

mod error;
pub use error::StateDbError;

mod statedb;
pub use statedb::StateDb;

mod treetx;
pub use treetx::{NoStateTx, SubTreeTx, TreeTx};

mod treeview;
pub use treeview::{NoStateView, SubTreeView, TreeView};
