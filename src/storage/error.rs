//! Storage error types
//!
//! Defines all errors that can occur in the store and persistence layer.
//! Duplicate keys and missing ids are not errors: they are reported through
//! `bool` / `Option` returns on `OrderStore`.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed (missing file, permission denied, disk failure)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Data corruption detected (checksum mismatch, broken index invariant, etc.)
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Snapshot format error (bad magic, unsupported version, truncated input)
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A persistence operation did not finish in time
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True for errors meaning "these bytes are not a valid snapshot"
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            StorageError::Serialization(_)
                | StorageError::Compression(_)
                | StorageError::Corruption(_)
                | StorageError::InvalidSnapshot(_)
        )
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
