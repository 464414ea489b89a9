//! Node-store adapters bridging trees to the namespaced KV layout.
//!
//! Tree nodes of the instance with prefix `p` live under `p ++ "n/" ++
//! hash`. Readers either look straight at a committed snapshot or through
//! the write transaction's pending overlay first.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::B256;
use urna_kv::StoreSnapshot;
use urna_tree::{NodeRead, NodeWrite, TreeError};

const NODE_TAG: &[u8] = b"n/";

pub(crate) fn node_key(prefix: &[u8], hash: &B256) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + NODE_TAG.len() + 32);
    key.extend_from_slice(prefix);
    key.extend_from_slice(NODE_TAG);
    key.extend_from_slice(hash.as_slice());
    key
}

/// Read-only adapter over a committed snapshot.
pub(crate) struct SnapshotNodes<'a> {
    pub snap: &'a Arc<dyn StoreSnapshot>,
    pub prefix: Vec<u8>,
}

impl NodeRead for SnapshotNodes<'_> {
    fn get_node(&self, hash: &B256) -> Result<Option<Vec<u8>>, TreeError> {
        Ok(self.snap.get(&node_key(&self.prefix, hash))?)
    }
}

/// Read adapter layering pending writes over the base snapshot.
pub(crate) struct OverlayNodes<'a> {
    pub pending: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    pub snap: &'a Arc<dyn StoreSnapshot>,
    pub prefix: Vec<u8>,
}

impl NodeRead for OverlayNodes<'_> {
    fn get_node(&self, hash: &B256) -> Result<Option<Vec<u8>>, TreeError> {
        let key = node_key(&self.prefix, hash);
        if let Some(value) = self.pending.get(&key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.snap.get(&key)?)
    }
}

/// Write adapter collecting new nodes into the pending overlay.
pub(crate) struct OverlayNodesMut<'a> {
    pub pending: &'a mut BTreeMap<Vec<u8>, Vec<u8>>,
    pub snap: &'a Arc<dyn StoreSnapshot>,
    pub prefix: Vec<u8>,
}

impl NodeRead for OverlayNodesMut<'_> {
    fn get_node(&self, hash: &B256) -> Result<Option<Vec<u8>>, TreeError> {
        let key = node_key(&self.prefix, hash);
        if let Some(value) = self.pending.get(&key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.snap.get(&key)?)
    }
}

impl NodeWrite for OverlayNodesMut<'_> {
    fn put_node(&mut self, hash: B256, bytes: Vec<u8>) -> Result<(), TreeError> {
        self.pending.insert(node_key(&self.prefix, &hash), bytes);
        Ok(())
    }
}
