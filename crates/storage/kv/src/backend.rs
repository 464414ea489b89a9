//! Durable store backend built on redb.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadOnlyTable, ReadableTable, TableDefinition, TableError};
use tracing::debug;

use crate::{KvError, Store, StoreSnapshot, WriteBatch};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("state");

/// Durable [`Store`] backed by a single-file redb database.
///
/// All state lives in one table; callers namespace their keys. Snapshots
/// map onto redb read transactions, which pin an MVCC view of the file
/// until dropped.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store inside `data_dir`.
    ///
    /// Creates the directory (if needed) and `state.redb` inside.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, KvError> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join("state.redb");
        debug!(path = %path.display(), "opening state store");
        let db = Database::create(path)?;
        Ok(Self { db })
    }
}

impl Store for RedbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let txn = self.db.begin_read()?;
        match txn.open_table(TABLE) {
            Ok(table) => Ok(table.get(key)?.map(|v| v.value().to_vec())),
            // A fresh database has no table until the first write batch.
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_batch(&self, ops: WriteBatch) -> Result<(), KvError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TABLE)?;
            for (key, value) in ops {
                match value {
                    Some(v) => {
                        table.insert(key.as_slice(), v.as_slice())?;
                    }
                    None => {
                        table.remove(key.as_slice())?;
                    }
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn snapshot(&self) -> Result<Arc<dyn StoreSnapshot>, KvError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(TABLE) {
            Ok(table) => Some(table),
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Arc::new(RedbSnapshot { table }))
    }
}

struct RedbSnapshot {
    table: Option<ReadOnlyTable<&'static [u8], &'static [u8]>>,
}

impl StoreSnapshot for RedbSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        match &self.table {
            Some(table) => Ok(table.get(key)?.map(|v| v.value().to_vec())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path()).unwrap();
        assert!(store.get(b"anything").unwrap().is_none());
    }

    #[test]
    fn write_batch_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path()).unwrap();

        store
            .write_batch(vec![
                (b"x".to_vec(), Some(b"1".to_vec())),
                (b"y".to_vec(), Some(b"2".to_vec())),
            ])
            .unwrap();

        assert_eq!(store.get(b"x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"y").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn empty_snapshot_reads_none() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path()).unwrap();
        let snap = store.snapshot().unwrap();
        assert!(snap.get(b"x").unwrap().is_none());
    }

    #[test]
    fn snapshot_is_stable_across_later_batches() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path()).unwrap();
        store.write_batch(vec![(b"k".to_vec(), Some(b"old".to_vec()))]).unwrap();

        let snap = store.snapshot().unwrap();
        store.write_batch(vec![(b"k".to_vec(), Some(b"new".to_vec()))]).unwrap();

        assert_eq!(snap.get(b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn reopen_preserves_contents() {
        let dir = tempdir().unwrap();
        {
            let store = RedbStore::open(dir.path()).unwrap();
            store.write_batch(vec![(b"p".to_vec(), Some(b"q".to_vec()))]).unwrap();
        }
        let store = RedbStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"p").unwrap(), Some(b"q".to_vec()));
    }
}
