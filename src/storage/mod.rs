//! orderdb Storage
//!
//! This module provides the indexed order store and its persistence:
//!
//! - **types**: Core data structures (Order, OrderId, date helpers)
//! - **engine**: `OrderStore`, the primary collection plus secondary indexes
//! - **snapshot**: Snapshot file format (header + checksummed body)
//! - **files**: File abstraction (`FileStore`) with local and in-memory stores
//! - **database**: `Database`, save/load and backup/restore around a store
//! - **shared**: `SharedDatabase`, a lock-guarded handle for concurrent callers
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   add/edit/remove → OrderStore (primary map + 3 indexes, one step)
//!
//! Persistence:
//!   all_records() → SnapshotCodec::encode → FileStore::write_all
//!   FileStore::read_all → SnapshotCodec::decode → clear() + add() each
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use orderdb::storage::{Database, Order};
//! use chrono::NaiveDate;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut db = Database::new("./data/orders.db");
//!
//!     let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//!     db.store_mut().add(Order::new(1, "5 Elm St", date, 2.5));
//!
//!     let at_elm = db.store().find_by_address("5 Elm St");
//!     println!("{} orders at 5 Elm St", at_elm.len());
//!
//!     db.save()?;
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod engine;
pub mod error;
pub mod files;
pub mod shared;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use database::{Database, LoadReport, DEFAULT_BACKUP_SUFFIX};
pub use engine::OrderStore;
pub use error::{StorageError, StorageResult};
pub use files::{FileStore, LocalFileStore, MemoryFileStore};
pub use shared::SharedDatabase;
pub use snapshot::{Compression, SnapshotCodec, SnapshotHeader};
pub use types::{format_date, parse_date, Order, OrderId, DATE_FORMAT};
