//! The persistent store: one live database plus its durable snapshot.
//!
//! All reads and writes go through a single `parking_lot::Mutex`. Writes use
//! [`Store::batch`], which restores the pre-batch contents when the closure
//! fails. Durability is a whole-database snapshot written either immediately
//! ([`Store::flush`]) or through the coalescing scheduler
//! ([`Store::schedule_durable_save`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::migrations;
use crate::schema::Database;
use crate::snapshot::{SnapshotStorage, decode_snapshot, encode_snapshot};

/// Completion handle of a scheduled durable save.
///
/// Every request in one debounce window receives a clone of the same handle.
#[derive(Clone, Debug)]
pub struct PendingSave {
    rx: watch::Receiver<bool>,
}

impl PendingSave {
    fn completed() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    /// Whether the write has finished.
    pub fn is_done(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the write. Write failures are logged by the store, not returned.
    pub async fn wait(mut self) {
        // A dropped sender means the flush task is gone; nothing left to wait for.
        let _ = self.rx.wait_for(|done| *done).await;
    }
}

/// Schema-versioned embedded database with debounced snapshotting.
pub struct Store {
    config: StoreConfig,
    storage: Arc<dyn SnapshotStorage>,
    db: Mutex<Option<Database>>,
    pending: Mutex<Option<PendingSave>>,
}

impl Store {
    pub fn new(storage: Arc<dyn SnapshotStorage>, config: StoreConfig) -> Self {
        Self {
            config,
            storage,
            db: Mutex::new(None),
            pending: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.db.lock().is_some()
    }

    /// Load or create the database, migrate it and flush it.
    ///
    /// The database goes live only once its snapshot is written, so a failed
    /// start leaves the store unstarted and a later call retries from storage.
    pub fn ensure_started(&self) -> Result<(), StoreError> {
        let mut guard = self.db.lock();
        if guard.is_some() {
            return Ok(());
        }

        let mut db = self.load_snapshot();
        let from = db.user_version;
        let applied = migrations::apply(&mut db)?;

        let blob = encode_snapshot(&db)?;
        self.write_blob(&blob)?;
        info!(from, to = db.user_version, applied, "store started");
        *guard = Some(db);
        Ok(())
    }

    fn load_snapshot(&self) -> Database {
        match self.storage.get(&self.config.snapshot_key) {
            Ok(Some(blob)) => match decode_snapshot(&blob) {
                Ok(db) => {
                    debug!(bytes = blob.len(), version = db.user_version, "loaded snapshot");
                    db
                }
                Err(e) => {
                    error!(error = %e, key = %self.config.snapshot_key, "corrupt snapshot, starting empty");
                    Database::default()
                }
            },
            Ok(None) => {
                debug!("no snapshot found, creating database");
                Database::default()
            }
            Err(e) => {
                error!(error = %e, "snapshot storage unreadable, starting empty");
                Database::default()
            }
        }
    }

    /// The live database.
    pub fn handle(&self) -> Result<MappedMutexGuard<'_, Database>, StoreError> {
        MutexGuard::try_map(self.db.lock(), |db| db.as_mut()).map_err(|_| StoreError::NotStarted)
    }

    /// Run a read-only closure against the database.
    pub fn read<R>(&self, f: impl FnOnce(&Database) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let db = self.handle()?;
        f(&db)
    }

    /// Apply an infallible write to one table.
    ///
    /// `table` selects the table and is the only step that can fail, before
    /// anything changes, so no rollback copy is taken. Prefer this over
    /// [`Store::batch`] for hot single-table writes such as coin upserts.
    pub fn update<K, V, R>(
        &self,
        table: impl FnOnce(&mut Database) -> Result<&mut BTreeMap<K, V>, StoreError>,
        f: impl FnOnce(&mut BTreeMap<K, V>) -> R,
    ) -> Result<R, StoreError> {
        let mut db = self.handle()?;
        Ok(f(table(&mut *db)?))
    }

    /// Run `f` as one all-or-nothing write.
    ///
    /// If `f` fails, the database is restored to its contents before the call.
    /// This clones the whole database up front; single-table writes that
    /// cannot fail part way should use [`Store::update`].
    pub fn batch<R>(&self, f: impl FnOnce(&mut Database) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut db = self.handle()?;
        let before = db.clone();
        match f(&mut db) {
            Ok(r) => Ok(r),
            Err(e) => {
                *db = before;
                warn!(error = %e, "batch rolled back");
                Err(e)
            }
        }
    }

    pub fn schema_version(&self) -> Result<u32, StoreError> {
        Ok(self.handle()?.user_version)
    }

    /// Write the snapshot now.
    pub fn flush(&self) -> Result<(), StoreError> {
        let blob = {
            let db = self.handle()?;
            encode_snapshot(&db)?
        };
        self.write_blob(&blob)
    }

    fn write_blob(&self, blob: &[u8]) -> Result<(), StoreError> {
        self.storage.set(&self.config.snapshot_key, blob)?;
        debug!(bytes = blob.len(), "snapshot written");
        Ok(())
    }

    /// Drop every table, migrate from version 0 and flush.
    pub fn reset(&self) -> Result<(), StoreError> {
        let blob = {
            let mut db = self.handle()?;
            db.drop_all();
            migrations::apply(&mut db)?;
            encode_snapshot(&db)?
        };
        info!("store reset");
        self.write_blob(&blob)
    }

    /// Request a durable save, coalesced with other requests.
    ///
    /// The first request of a burst starts a timer; requests until it fires
    /// share its completion handle. The pending slot is cleared before the
    /// write, so a request arriving mid-write schedules a fresh save.
    /// Without a tokio runtime the save happens synchronously.
    pub fn schedule_durable_save(self: &Arc<Self>) -> PendingSave {
        let mut pending = self.pending.lock();
        if let Some(save) = pending.as_ref() {
            return save.clone();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            drop(pending);
            self.flush_logged();
            return PendingSave::completed();
        };

        let (tx, rx) = watch::channel(false);
        let save = PendingSave { rx };
        *pending = Some(save.clone());
        drop(pending);

        let store = Arc::clone(self);
        runtime.spawn(async move {
            tokio::time::sleep(store.config.save_debounce()).await;
            store.pending.lock().take();
            store.flush_logged();
            let _ = tx.send(true);
        });
        save
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "durable save failed; in-memory state is ahead of storage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshotStorage;

    fn memory_store() -> (Arc<MemorySnapshotStorage>, Arc<Store>) {
        let storage = Arc::new(MemorySnapshotStorage::new());
        let store = Arc::new(Store::new(storage.clone(), StoreConfig::default()));
        (storage, store)
    }

    #[test]
    fn handle_before_start_fails() {
        let (_, store) = memory_store();
        assert!(matches!(store.handle(), Err(StoreError::NotStarted)));
        assert!(!store.is_started());
    }

    #[test]
    fn ensure_started_flushes_once() {
        let (storage, store) = memory_store();
        store.ensure_started().unwrap();
        assert_eq!(storage.write_count(), 1);
        assert_eq!(store.schema_version().unwrap(), migrations::target_version());
        store.ensure_started().unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn batch_error_restores_contents() {
        let (_, store) = memory_store();
        store.ensure_started().unwrap();
        let res: Result<(), _> = store.batch(|db| {
            db.token_metadata = None;
            Err(StoreError::Storage("boom".into()))
        });
        assert!(res.is_err());
        assert!(store.read(|db| Ok(db.token_metadata().is_ok())).unwrap());
    }

    #[test]
    fn update_on_missing_table_fails() {
        let (_, store) = memory_store();
        store.ensure_started().unwrap();
        store.batch(|db| {
            db.token_metadata = None;
            Ok(())
        })
        .unwrap();

        let res = store.update(Database::token_metadata_mut, |table| table.len());
        assert!(matches!(res, Err(StoreError::MissingTable("token_metadata"))));
        assert_eq!(store.update(Database::wallets_mut, |table| table.len()).unwrap(), 0);
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let storage = Arc::new(MemorySnapshotStorage::new());
        storage.set("cashvault.db", b"garbage").unwrap();
        let store = Store::new(storage.clone(), StoreConfig::default());
        store.ensure_started().unwrap();
        assert_eq!(store.schema_version().unwrap(), 2);
        let reloaded = decode_snapshot(&storage.get("cashvault.db").unwrap().unwrap()).unwrap();
        assert_eq!(reloaded.user_version, 2);
    }

    /// Rejects the first `failures` writes, then delegates to memory.
    struct FlakyStorage {
        inner: MemorySnapshotStorage,
        failures: Mutex<usize>,
    }

    impl SnapshotStorage for FlakyStorage {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Storage("disk full".into()));
            }
            self.inner.set(key, bytes)
        }
    }

    #[test]
    fn failed_start_write_leaves_store_unstarted() {
        let storage = Arc::new(FlakyStorage {
            inner: MemorySnapshotStorage::new(),
            failures: Mutex::new(1),
        });
        let store = Store::new(storage.clone(), StoreConfig::default());

        assert!(matches!(store.ensure_started(), Err(StoreError::Storage(_))));
        assert!(!store.is_started());
        assert!(storage.get("cashvault.db").unwrap().is_none());

        store.ensure_started().unwrap();
        assert!(store.is_started());
        let durable = decode_snapshot(&storage.get("cashvault.db").unwrap().unwrap()).unwrap();
        assert_eq!(durable.user_version, migrations::target_version());
    }

    #[test]
    fn schedule_without_runtime_flushes_inline() {
        let (storage, store) = memory_store();
        store.ensure_started().unwrap();
        let save = store.schedule_durable_save();
        assert!(save.is_done());
        assert_eq!(storage.write_count(), 2);
    }
}
