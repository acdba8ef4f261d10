//! File abstraction used by persistence
//!
//! `Database` never touches `std::fs` directly; it reads and writes whole
//! snapshot files through a `FileStore`.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Whole-file read/write
pub trait FileStore: Send + Sync + std::fmt::Debug {
    /// Read the full contents of `path`
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the contents of `path` with `bytes`
    fn write_all(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Check if `path` exists
    fn exists(&self, path: &Path) -> bool;
}

/// Local filesystem storage
///
/// Writes go to `<path>.<pid>.<seq>.tmp`, are fsynced, then renamed over the
/// target, so a failed write leaves the previous file intact. Each write has
/// its own temporary file; concurrent writers to one path never share one,
/// and the last rename wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl LocalFileStore {
    fn tmp_path(path: &Path) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.{}.tmp", std::process::id(), seq));
        PathBuf::from(tmp)
    }
}

impl FileStore for LocalFileStore {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = Self::tmp_path(path);
        let result = (|| {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory storage, for tests and embedding without a filesystem
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Lock error: {}", e)))
    }
}

impl FileStore for MemoryFileStore {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lock()?.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }

    fn write_all(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.lock()?.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().map(|files| files.contains_key(path)).unwrap_or(false)
    }
}
