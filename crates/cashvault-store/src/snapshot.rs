//! Durable byte storage for database snapshots.
//!
//! The store serializes the whole database into one blob and hands it to a
//! [`SnapshotStorage`] under a single key. [`RocksSnapshotStorage`] keeps
//! blobs in a RocksDB column family; [`MemorySnapshotStorage`] keeps them in
//! a map and counts writes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use bincode::config;
use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};

use crate::error::StoreError;
use crate::schema::Database;

const CF_SNAPSHOTS: &str = "snapshots";

/// Leading bytes of every snapshot blob.
const SNAPSHOT_MAGIC: &[u8; 4] = b"CVDB";

/// Key-value byte storage holding snapshot blobs.
pub trait SnapshotStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Serialize a database into a snapshot blob.
pub fn encode_snapshot(db: &Database) -> Result<Vec<u8>, StoreError> {
    let body = bincode::encode_to_vec(db, config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut blob = Vec::with_capacity(SNAPSHOT_MAGIC.len() + body.len());
    blob.extend_from_slice(SNAPSHOT_MAGIC);
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Parse a snapshot blob.
pub fn decode_snapshot(blob: &[u8]) -> Result<Database, StoreError> {
    let body = blob
        .strip_prefix(SNAPSHOT_MAGIC.as_slice())
        .ok_or_else(|| StoreError::Snapshot("missing snapshot header".into()))?;
    let (db, read): (Database, usize) = bincode::decode_from_slice(body, config::standard())
        .map_err(|e| StoreError::Snapshot(e.to_string()))?;
    if read != body.len() {
        return Err(StoreError::Snapshot(format!(
            "{} trailing bytes after snapshot",
            body.len() - read
        )));
    }
    Ok(db)
}

/// Snapshot storage in a RocksDB column family.
pub struct RocksSnapshotStorage {
    db: DB,
}

impl RocksSnapshotStorage {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_SNAPSHOTS, Options::default());
        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), vec![cf])?;
        Ok(Self { db })
    }

    fn cf_handle(&self) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_SNAPSHOTS)
            .ok_or_else(|| StoreError::Storage(format!("missing column family: {CF_SNAPSHOTS}")))
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        Ok(self.db.flush()?)
    }
}

impl SnapshotStorage for RocksSnapshotStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf_handle()?;
        Ok(self.db.get_cf(&cf, key.as_bytes())?)
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf_handle()?;
        Ok(self.db.put_cf(&cf, key.as_bytes(), bytes)?)
    }
}

/// In-process snapshot storage.
#[derive(Default)]
pub struct MemorySnapshotStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemorySnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    #[test]
    fn snapshot_roundtrip() {
        let mut db = Database::default();
        migrations::apply(&mut db).unwrap();
        let blob = encode_snapshot(&db).unwrap();
        assert_eq!(&blob[..4], b"CVDB");
        assert_eq!(decode_snapshot(&blob).unwrap(), db);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode_snapshot(b"not a db"), Err(StoreError::Snapshot(_))));
        assert!(matches!(decode_snapshot(b"CVDB\xff\xff"), Err(StoreError::Snapshot(_))));
    }

    #[test]
    fn memory_storage_counts_writes() {
        let storage = MemorySnapshotStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", b"v1").unwrap();
        storage.set("k", b"v2").unwrap();
        assert_eq!(storage.get("k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn rocks_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = RocksSnapshotStorage::open(dir.path()).unwrap();
            storage.set("cashvault.db", b"blob").unwrap();
            storage.flush().unwrap();
        }
        let storage = RocksSnapshotStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get("cashvault.db").unwrap(), Some(b"blob".to_vec()));
        assert_eq!(storage.get("other").unwrap(), None);
    }
}
