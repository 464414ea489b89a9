//! In-memory store backend.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::{KvError, Store, StoreSnapshot, WriteBatch};

/// In-memory [`Store`] backed by an ordered map.
///
/// Snapshots clone the full map, which is acceptable for tests and
/// short-lived tooling but not for production datasets.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn write_batch(&self, ops: WriteBatch) -> Result<(), KvError> {
        let mut data = self.data.write().unwrap();
        for (key, value) in ops {
            match value {
                Some(v) => {
                    data.insert(key, v);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Arc<dyn StoreSnapshot>, KvError> {
        let data = self.data.read().unwrap().clone();
        Ok(Arc::new(MemorySnapshot { data }))
    }
}

#[derive(Debug)]
struct MemorySnapshot {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl StoreSnapshot for MemorySnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.data.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_missing_key() {
        let store = MemoryStore::new();
        assert!(store.get(b"missing").unwrap().is_none());
    }

    #[test]
    fn write_batch_applies_puts_and_deletes() {
        let store = MemoryStore::new();
        store
            .write_batch(vec![
                (b"a".to_vec(), Some(b"1".to_vec())),
                (b"b".to_vec(), Some(b"2".to_vec())),
            ])
            .unwrap();
        store.write_batch(vec![(b"a".to_vec(), None)]).unwrap();

        assert!(store.get(b"a").unwrap().is_none());
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn snapshot_is_stable_across_later_writes() {
        let store = MemoryStore::new();
        store.write_batch(vec![(b"k".to_vec(), Some(b"v1".to_vec()))]).unwrap();

        let snap = store.snapshot().unwrap();
        store.write_batch(vec![(b"k".to_vec(), Some(b"v2".to_vec()))]).unwrap();

        assert_eq!(snap.get(b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }
}
