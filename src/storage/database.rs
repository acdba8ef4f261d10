//! Persistence orchestration
//!
//! `Database` binds an `OrderStore` to a primary snapshot file and a backup
//! file at `<primary><suffix>` (`orders.db` → `orders.db.bak` by default).
//!
//! ```text
//! save / backup:    all_records() → encode → FileStore::write_all
//! load / restore:   clear() → FileStore::read_all → decode → add() each
//! ```
//!
//! A failed load or restore leaves the store empty, not unchanged: the store
//! is cleared before the file is read. Duplicate ids inside a snapshot keep
//! their first occurrence and are counted in `LoadReport::duplicates`.

use crate::config::StorageConfig;
use crate::storage::engine::OrderStore;
use crate::storage::error::StorageResult;
use crate::storage::files::{FileStore, LocalFileStore};
use crate::storage::snapshot::SnapshotCodec;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default suffix for the backup file
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Outcome of a load or restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Orders added to the store
    pub loaded: usize,
    /// Orders dropped because an earlier record had the same id
    pub duplicates: usize,
}

/// An order store bound to its snapshot files
#[derive(Debug)]
pub struct Database {
    store: OrderStore,
    primary_path: PathBuf,
    backup_path: PathBuf,
    codec: SnapshotCodec,
    files: Arc<dyn FileStore>,
}

impl Database {
    /// Create an empty database on the local filesystem
    pub fn new(primary_path: impl Into<PathBuf>) -> Self {
        Self::with_file_store(primary_path, Arc::new(LocalFileStore))
    }

    /// Create an empty database on a custom file store
    pub fn with_file_store(primary_path: impl Into<PathBuf>, files: Arc<dyn FileStore>) -> Self {
        let primary_path = primary_path.into();
        let backup_path = derive_backup_path(&primary_path, DEFAULT_BACKUP_SUFFIX);

        Self {
            store: OrderStore::new(),
            primary_path,
            backup_path,
            codec: SnapshotCodec::default(),
            files,
        }
    }

    /// Builder: set the backup suffix
    pub fn backup_suffix(mut self, suffix: &str) -> Self {
        self.backup_path = derive_backup_path(&self.primary_path, suffix);
        self
    }

    /// Builder: set the snapshot codec
    pub fn codec(mut self, codec: SnapshotCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Open the database described by `config`
    ///
    /// Loads the primary file if it exists; otherwise starts empty.
    pub fn open(config: &StorageConfig) -> StorageResult<Self> {
        Self::open_with(config, Arc::new(LocalFileStore))
    }

    /// Open the database described by `config` on a custom file store
    pub fn open_with(config: &StorageConfig, files: Arc<dyn FileStore>) -> StorageResult<Self> {
        let mut db = Self::with_file_store(&config.db_path, files)
            .backup_suffix(&config.backup_suffix)
            .codec(SnapshotCodec::new(config.compression));

        if db.files.exists(&db.primary_path) {
            db.load()?;
        } else {
            tracing::info!(path = ?db.primary_path, "No database file yet, starting empty");
        }

        Ok(db)
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut OrderStore {
        &mut self.store
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub(crate) fn file_store(&self) -> Arc<dyn FileStore> {
        Arc::clone(&self.files)
    }

    // ==================== Persistence ====================

    /// Write the current contents to the primary file
    pub fn save(&self) -> StorageResult<()> {
        self.write_snapshot(&self.primary_path)
    }

    /// Replace the store's contents with the primary file
    pub fn load(&mut self) -> StorageResult<LoadReport> {
        let path = self.primary_path.clone();
        self.read_snapshot(&path)
    }

    /// Write the current contents to the backup file
    pub fn backup(&self) -> StorageResult<()> {
        self.write_snapshot(&self.backup_path)
    }

    /// Replace the store's contents with the backup file
    pub fn restore(&mut self) -> StorageResult<LoadReport> {
        let path = self.backup_path.clone();
        self.read_snapshot(&path)
    }

    /// Back up, then run `op` against the store
    ///
    /// `op` does not run if the backup fails.
    pub fn with_backup<T>(&mut self, op: impl FnOnce(&mut OrderStore) -> T) -> StorageResult<T> {
        self.backup()?;
        Ok(op(&mut self.store))
    }

    /// Encode the current contents
    pub(crate) fn encode_snapshot(&self) -> StorageResult<Vec<u8>> {
        self.codec.encode(&self.store.all_records())
    }

    fn write_snapshot(&self, path: &Path) -> StorageResult<()> {
        let bytes = self.encode_snapshot()?;
        self.files.write_all(path, &bytes).map_err(|e| {
            tracing::error!(path = ?path, error = %e, "Failed to write snapshot");
            e
        })?;

        tracing::info!(
            path = ?path,
            records = self.store.len(),
            bytes = bytes.len(),
            "Wrote snapshot"
        );
        Ok(())
    }

    fn read_snapshot(&mut self, path: &Path) -> StorageResult<LoadReport> {
        self.store.clear();

        let bytes = self.files.read_all(path).map_err(|e| {
            tracing::error!(path = ?path, error = %e, "Failed to read snapshot");
            e
        })?;

        let report = self.replay(&bytes)?;
        tracing::info!(
            path = ?path,
            loaded = report.loaded,
            duplicates = report.duplicates,
            "Read snapshot"
        );
        Ok(report)
    }

    /// Decode `bytes` and add each order to the (already cleared) store
    pub(crate) fn replay(&mut self, bytes: &[u8]) -> StorageResult<LoadReport> {
        let orders = self.codec.decode(bytes)?;
        let mut report = LoadReport::default();

        for order in orders {
            let id = order.id;
            if self.store.add(order) {
                report.loaded += 1;
            } else {
                report.duplicates += 1;
                tracing::warn!(id, "Dropped duplicate order id in snapshot");
            }
        }

        Ok(report)
    }
}

/// `<primary><suffix>`, appended to the file name rather than replacing the extension
fn derive_backup_path(primary: &Path, suffix: &str) -> PathBuf {
    let mut path: OsString = primary.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StorageError;
    use crate::storage::files::MemoryFileStore;
    use crate::storage::snapshot::Compression;
    use crate::storage::types::Order;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn memory_db() -> (Database, Arc<MemoryFileStore>) {
        let files = Arc::new(MemoryFileStore::new());
        let db = Database::with_file_store("/data/orders.db", files.clone());
        (db, files)
    }

    #[test]
    fn test_backup_path_derivation() {
        let db = Database::new("/data/orders.db");
        assert_eq!(db.backup_path(), Path::new("/data/orders.db.bak"));

        let db = Database::new("/data/orders.db").backup_suffix(".old");
        assert_eq!(db.backup_path(), Path::new("/data/orders.db.old"));
    }

    #[test]
    fn test_elm_street_scenario() {
        let dir = tempdir().unwrap();
        let mut db = Database::new(dir.path().join("orders.db"));

        let first = Order::new(1, "5 Elm St", date(2024, 1, 10), 2.5);
        let second = Order::new(2, "5 Elm St", date(2024, 2, 1), 3.0);
        assert!(db.store_mut().add(first));
        assert!(db.store_mut().add(second.clone()));

        assert_eq!(db.store().find_by_address("5 Elm St").len(), 2);

        assert_eq!(db.store_mut().remove_by_date(date(2024, 1, 10)), 1);
        assert_eq!(db.store().find_by_address("5 Elm St"), vec![second.clone()]);

        db.save().unwrap();
        db.store_mut().clear();
        assert!(db.store().is_empty());

        let report = db.load().unwrap();
        assert_eq!(report, LoadReport { loaded: 1, duplicates: 0 });
        assert_eq!(db.store().all_records(), vec![second]);
        db.store().verify_integrity().unwrap();
    }

    #[test]
    fn test_backup_and_restore_are_independent_of_primary() {
        let (mut db, files) = memory_db();
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));
        db.save().unwrap();

        db.store_mut()
            .add(Order::new(2, "b", date(2024, 1, 2), 2.0));
        db.backup().unwrap();

        let primary_before = files.read_all(db.primary_path()).unwrap();

        db.store_mut().clear();
        let report = db.restore().unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(db.store().len(), 2);
        assert_eq!(files.read_all(db.primary_path()).unwrap(), primary_before);

        db.load().unwrap();
        assert_eq!(db.store().len(), 1);
    }

    #[test]
    fn test_with_backup() {
        let (mut db, files) = memory_db();
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));

        let removed = db.with_backup(|store| store.remove_by_address("a")).unwrap();
        assert_eq!(removed, 1);
        assert!(db.store().is_empty());
        assert!(files.exists(db.backup_path()));

        db.restore().unwrap();
        assert!(db.store().contains(1));
    }

    #[test]
    fn test_with_backup_skips_op_when_backup_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let mut db = Database::new(blocker.join("orders.db"));
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));

        let result = db.with_backup(|store| store.clear());
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(db.store().len(), 1);
    }

    #[test]
    fn test_save_failure_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let mut db = Database::new(blocker.join("orders.db"));
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));
        let before = db.store().all_records();

        assert!(matches!(db.save(), Err(StorageError::Io(_))));
        assert_eq!(db.store().all_records(), before);
    }

    #[test]
    fn test_load_missing_file_leaves_store_empty() {
        let (mut db, _files) = memory_db();
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));

        let err = db.load().unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(db.store().is_empty());
    }

    #[test]
    fn test_load_corrupt_file_leaves_store_empty() {
        let (mut db, files) = memory_db();
        files
            .write_all(db.primary_path(), b"definitely not a snapshot, but long enough")
            .unwrap();
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));

        let err = db.load().unwrap_err();
        assert!(err.is_decode());
        assert!(db.store().is_empty());
        db.store().verify_integrity().unwrap();
    }

    #[test]
    fn test_restore_missing_backup_leaves_store_empty() {
        let (mut db, files) = memory_db();
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));
        db.save().unwrap();

        let err = db.restore().unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(db.store().is_empty());
        assert!(files.exists(db.primary_path()));
    }

    #[test]
    fn test_restore_corrupt_backup_leaves_store_empty() {
        let (mut db, files) = memory_db();
        files
            .write_all(db.backup_path(), b"definitely not a snapshot, but long enough")
            .unwrap();
        db.store_mut()
            .add(Order::new(1, "a", date(2024, 1, 1), 1.0));

        let err = db.restore().unwrap_err();
        assert!(err.is_decode());
        assert!(db.store().is_empty());
        db.store().verify_integrity().unwrap();
    }

    #[test]
    fn test_load_keeps_first_duplicate() {
        let (mut db, files) = memory_db();
        let orders = vec![
            Order::new(1, "first", date(2024, 1, 1), 1.0),
            Order::new(2, "other", date(2024, 1, 2), 2.0),
            Order::new(1, "second", date(2024, 1, 3), 3.0),
        ];
        let bytes = SnapshotCodec::default().encode(&orders).unwrap();
        files.write_all(db.primary_path(), &bytes).unwrap();

        let report = db.load().unwrap();

        assert_eq!(report, LoadReport { loaded: 2, duplicates: 1 });
        assert_eq!(db.store().find_by_id(1).unwrap().address, "first");
        assert!(db.store().find_by_address("second").is_empty());
    }

    #[test]
    fn test_open_from_config() {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            db_path: dir.path().join("orders.db"),
            backup_suffix: ".backup".to_string(),
            compression: Compression::None,
            ..Default::default()
        };

        let mut db = Database::open(&config).unwrap();
        assert!(db.store().is_empty());
        assert_eq!(db.backup_path(), dir.path().join("orders.db.backup"));

        db.store_mut()
            .add(Order::new(4, "d", date(2024, 4, 4), 4.0));
        db.save().unwrap();

        let reopened = Database::open(&config).unwrap();
        assert_eq!(reopened.store().all_records(), db.store().all_records());
    }
}
