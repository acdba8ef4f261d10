//! # orderdb
//!
//! Indexed shipment-order store. Orders are looked up by id, address, date or
//! weight in near-constant time, and the whole collection is persisted as a
//! checksummed snapshot with a sibling backup file.
//!
//! ## Features
//!
//! - **Consistent indexes**: the primary collection and the three secondary
//!   indexes change together on every add, remove, edit and clear
//! - **Exact-match lookups**: buckets keyed by normalized field values
//! - **Snapshots**: versioned binary format with CRC32 checks and LZ4
//! - **Backups**: `<db><suffix>` backup file, `with_backup` for destructive ops
//! - **Concurrency**: `SharedDatabase` serializes access behind one lock
//!
//! ## Modules
//!
//! - [`storage`]: Order store, snapshot codec and persistence
//! - [`index`]: Secondary index structures
//! - [`config`]: TOML + environment configuration
//! - [`export`]: CSV export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orderdb::storage::*;
//! use chrono::NaiveDate;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut db = Database::new("./orders.db");
//!
//!     let jan_10 = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//!     let feb_1 = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
//!     db.store_mut().add(Order::new(1, "5 Elm St", jan_10, 2.5));
//!     db.store_mut().add(Order::new(2, "5 Elm St", feb_1, 3.0));
//!
//!     // Back up before a destructive change
//!     let removed = db.with_backup(|store| store.remove_by_date(jan_10))?;
//!     println!("Removed {} orders", removed);
//!
//!     db.save()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod export;
pub mod index;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    Compression, Database, FileStore, LoadReport, LocalFileStore, MemoryFileStore, Order,
    OrderId, OrderStore, SharedDatabase, SnapshotCodec, StorageError, StorageResult,
};

pub use index::{DateKey, IndexManager, IndexStats, WeightKey};

pub use config::{Config, ConfigError, LoggingConfig, StorageConfig};

pub use export::{CsvExporter, ExportError};
