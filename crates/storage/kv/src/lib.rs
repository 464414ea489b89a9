//! Ordered byte-key storage adapter for the state engine.
//!
//! Wraps an embedded key/value store behind a small trait pair: [`Store`]
//! for reads and atomic write batches, [`StoreSnapshot`] for point-in-time
//! reads that stay stable while later batches land. Two backends are
//! provided: [`RedbStore`] for durable storage and [`MemoryStore`] for
//! tests and ephemeral nodes.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod backend;
pub use backend::RedbStore;

mod error;
pub use error::KvError;

mod memory;
pub use memory::MemoryStore;

mod store;
pub use store::{Store, StoreSnapshot, WriteBatch};
