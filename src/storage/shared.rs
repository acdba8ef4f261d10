//! Shared, lock-guarded database handle
//!
//! `Database` is a single-owner type. `SharedDatabase` puts it behind one
//! `tokio::sync::RwLock` so several tasks can use it without ever seeing a
//! half-applied mutation:
//!
//! - lookups take the read lock
//! - mutations take the write lock
//! - `save` / `backup` / `with_backup` take the writer guard first, encode,
//!   then write on the blocking pool; the guard is released only when the
//!   file write has finished
//! - `load` / `restore` hold the write lock for the whole
//!   clear → read → replay cycle
//!
//! The writer guard orders file writes: a save encodes only after every
//! earlier write has landed, so a later snapshot is never overwritten by an
//! older one.
//!
//! Persistence calls can be bounded by a timeout. For writes the timeout
//! covers waiting for the writer guard and the store lock; once a write has
//! started it is awaited to completion, so `Timeout` from `save` or
//! `backup` means the file was not touched. A load that times out leaves the
//! store empty, the same as any other failed load.

use crate::config::StorageConfig;
use crate::index::IndexStats;
use crate::storage::database::{Database, LoadReport};
use crate::storage::engine::OrderStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::files::FileStore;
use crate::storage::types::{Order, OrderId};
use chrono::NaiveDate;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Cloneable handle to a database shared between tasks
#[derive(Debug, Clone)]
pub struct SharedDatabase {
    inner: Arc<RwLock<Database>>,
    /// Held from encode until the file write finishes
    writer: Arc<Mutex<()>>,
    /// Upper bound for each persistence call
    timeout: Option<Duration>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(RwLock::new(db)),
            writer: Arc::new(Mutex::new(())),
            timeout: None,
        }
    }

    /// Open the database described by `config` on the blocking pool
    ///
    /// `persist_timeout_secs = 0` disables the persistence timeout.
    pub async fn open(config: StorageConfig) -> StorageResult<Self> {
        let timeout = match config.persist_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let db = tokio::task::spawn_blocking(move || Database::open(&config))
            .await
            .map_err(join_error)??;

        let mut shared = Self::new(db);
        shared.timeout = timeout;
        Ok(shared)
    }

    /// Builder: bound every persistence call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    // ==================== Mutations ====================

    pub async fn add(&self, order: Order) -> bool {
        self.inner.write().await.store_mut().add(order)
    }

    pub async fn remove(&self, id: OrderId) -> Option<Order> {
        self.inner.write().await.store_mut().remove(id)
    }

    pub async fn remove_by_address(&self, address: &str) -> usize {
        self.inner.write().await.store_mut().remove_by_address(address)
    }

    pub async fn remove_by_date(&self, date: NaiveDate) -> usize {
        self.inner.write().await.store_mut().remove_by_date(date)
    }

    pub async fn remove_by_weight(&self, weight: f64) -> usize {
        self.inner.write().await.store_mut().remove_by_weight(weight)
    }

    pub async fn edit(&self, id: OrderId, address: String, date: NaiveDate, weight: f64) -> bool {
        self.inner
            .write()
            .await
            .store_mut()
            .edit(id, address, date, weight)
    }

    pub async fn clear(&self) {
        self.inner.write().await.store_mut().clear()
    }

    // ==================== Queries ====================

    pub async fn find_by_id(&self, id: OrderId) -> Option<Order> {
        self.inner.read().await.store().find_by_id(id).cloned()
    }

    pub async fn find_by_address(&self, address: &str) -> Vec<Order> {
        self.inner.read().await.store().find_by_address(address)
    }

    pub async fn find_by_date(&self, date: NaiveDate) -> Vec<Order> {
        self.inner.read().await.store().find_by_date(date)
    }

    pub async fn find_by_weight(&self, weight: f64) -> Vec<Order> {
        self.inner.read().await.store().find_by_weight(weight)
    }

    pub async fn all_records(&self) -> Vec<Order> {
        self.inner.read().await.store().all_records()
    }

    pub async fn stats(&self) -> IndexStats {
        self.inner.read().await.store().stats()
    }

    /// Run a read-only closure against the store under the read lock
    pub async fn read<T>(&self, f: impl FnOnce(&OrderStore) -> T) -> T {
        f(self.inner.read().await.store())
    }

    // ==================== Persistence ====================

    /// Write the current contents to the primary file
    pub async fn save(&self) -> StorageResult<()> {
        self.write_snapshot(false).await
    }

    /// Write the current contents to the backup file
    pub async fn backup(&self) -> StorageResult<()> {
        self.write_snapshot(true).await
    }

    /// Replace the contents with the primary file
    pub async fn load(&self) -> StorageResult<LoadReport> {
        self.bounded(self.read_snapshot(false)).await
    }

    /// Replace the contents with the backup file
    pub async fn restore(&self) -> StorageResult<LoadReport> {
        self.bounded(self.read_snapshot(true)).await
    }

    /// Back up, then run `op` against the store, all under the write lock
    ///
    /// `op` does not run if the backup fails or times out.
    pub async fn with_backup<T>(&self, op: impl FnOnce(&mut OrderStore) -> T) -> StorageResult<T> {
        let (guard, mut db) = self
            .bounded(async {
                let guard = self.lock_writer().await;
                Ok::<_, StorageError>((guard, self.inner.write().await))
            })
            .await?;

        let bytes = db.encode_snapshot()?;
        write_file(db.file_store(), db.backup_path().to_path_buf(), bytes, guard).await?;
        Ok(op(db.store_mut()))
    }

    async fn write_snapshot(&self, to_backup: bool) -> StorageResult<()> {
        let (guard, bytes, path, files, records) = self
            .bounded(async {
                let guard = self.lock_writer().await;
                let db = self.inner.read().await;
                let path = if to_backup {
                    db.backup_path()
                } else {
                    db.primary_path()
                };
                Ok::<_, StorageError>((
                    guard,
                    db.encode_snapshot()?,
                    path.to_path_buf(),
                    db.file_store(),
                    db.store().len(),
                ))
            })
            .await?;

        let bytes_len = bytes.len();
        write_file(files, path.clone(), bytes, guard).await?;
        tracing::info!(path = ?path, records, bytes = bytes_len, "Wrote snapshot");
        Ok(())
    }

    async fn lock_writer(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.writer).lock_owned().await
    }

    async fn read_snapshot(&self, from_backup: bool) -> StorageResult<LoadReport> {
        let mut db = self.inner.write().await;
        db.store_mut().clear();

        let path = if from_backup {
            db.backup_path()
        } else {
            db.primary_path()
        }
        .to_path_buf();
        let files = db.file_store();

        let read_path = path.clone();
        let bytes = tokio::task::spawn_blocking(move || files.read_all(&read_path))
            .await
            .map_err(join_error)??;

        let report = db.replay(&bytes)?;
        tracing::info!(
            path = ?path,
            loaded = report.loaded,
            duplicates = report.duplicates,
            "Read snapshot"
        );
        Ok(report)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| StorageError::Timeout(limit))?,
            None => fut.await,
        }
    }
}

/// Write on the blocking pool, releasing `guard` only once the write is done
///
/// The guard travels with the blocking task, so a caller that stops waiting
/// still cannot let the next writer start early.
async fn write_file(
    files: Arc<dyn FileStore>,
    path: PathBuf,
    bytes: Vec<u8>,
    guard: OwnedMutexGuard<()>,
) -> StorageResult<()> {
    tokio::task::spawn_blocking(move || {
        let result = files.write_all(&path, &bytes);
        drop(guard);
        result
    })
    .await
    .map_err(join_error)??;
    Ok(())
}

fn join_error(err: tokio::task::JoinError) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Blocking task failed: {}", err),
    ))
}
