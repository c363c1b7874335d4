//! ACID-durable key-value store backed by redb.
//!
//! Holds the local learning-track records. Keys are byte strings laid out as
//! `/`-separated paths so related records can be listed with a prefix scan.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::StoreResult;

/// Table for all records (byte keys → binary values).
const RECORDS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

const DB_FILE: &str = "skill-atlas.redb";

/// ACID-durable store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
#[derive(Clone)]
pub struct DurableStore {
    db: Arc<Database>,
}

fn redb_err(context: &str, e: impl Into<redb::Error>) -> StoreError {
    StoreError::Redb {
        message: format!("{context} failed: {}", e.into()),
    }
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the table up front so readers never see it missing.
        let txn = db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        txn.open_table(RECORDS_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        txn.commit().map_err(|e| redb_err("commit", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Store a key-value pair with full ACID guarantees.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.put_many(&[(key, value)])
    }

    /// Store several pairs in one transaction; either all land or none do.
    pub fn put_many(&self, entries: &[(&[u8], &[u8])]) -> StoreResult<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        {
            let mut table = txn
                .open_table(RECORDS_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            for (key, value) in entries {
                table
                    .insert(*key, *value)
                    .map_err(|e| redb_err("insert", e))?;
            }
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    /// Read a value by key. Returns `Ok(None)` if the key doesn't exist.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(RECORDS_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let result = table
            .get(key)
            .map_err(|e| redb_err("get", e))?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    /// Delete a key. Returns whether the key existed.
    pub fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| redb_err("begin_write", e))?;
        let existed = {
            let mut table = txn
                .open_table(RECORDS_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            let result = table
                .remove(key)
                .map_err(|e| redb_err("remove", e))?;
            result.is_some()
        };
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(existed)
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        self.get(key).map(|v| v.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(RECORDS_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let range = table
            .range::<&[u8]>(prefix..)
            .map_err(|e| redb_err("range", e))?;

        let mut out = Vec::new();
        for entry in range {
            let (key, value) = entry.map_err(|e| redb_err("range", e))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put(b"hello", b"world").unwrap();
        assert_eq!(store.get(b"hello").unwrap(), Some(b"world".to_vec()));
        assert!(store.contains(b"hello").unwrap());

        assert!(store.remove(b"hello").unwrap());
        assert!(!store.contains(b"hello").unwrap());
        assert_eq!(store.get(b"hello").unwrap(), None);
    }

    #[test]
    fn empty_store_reads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"missing").unwrap(), None);
        assert!(store.scan_prefix(b"track/").unwrap().is_empty());
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();

        {
            let store = DurableStore::open(dir.path()).unwrap();
            store.put(b"persist_key", b"persist_val").unwrap();
        }

        let store = DurableStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(b"persist_key").unwrap(),
            Some(b"persist_val".to_vec())
        );
    }

    #[test]
    fn prefix_scan_stops_at_boundary() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        store
            .put_many(&[
                (b"user/ada/1".as_slice(), b"a".as_slice()),
                (b"user/ada/2".as_slice(), b"b".as_slice()),
                (b"user/bob/1".as_slice(), b"c".as_slice()),
                (b"track/x".as_slice(), b"d".as_slice()),
            ])
            .unwrap();

        let ada = store.scan_prefix(b"user/ada/").unwrap();
        assert_eq!(ada.len(), 2);
        assert_eq!(ada[0].0, b"user/ada/1".to_vec());
        assert_eq!(ada[1].1, b"b".to_vec());
    }
}
