//! Snapshot file format for orderdb persistence
//!
//! A snapshot holds every live order at one point in time. The primary
//! database file and its backup both use this format.
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (32 bytes)                       │
//! │   magic: [u8; 4] = "ORDB"               │
//! │   version: u16                          │
//! │   compression: u8                       │
//! │   reserved: u8                          │
//! │   record_count: u32                     │
//! │   body_len: u32                         │
//! │   body_checksum: u32                    │
//! │   reserved: [u8; 8]                     │
//! │   header_checksum: u32                  │
//! ├─────────────────────────────────────────┤
//! │ BODY (body_len bytes)                   │
//! │   bincode(Vec<EncodedOrder>)            │
//! │   optionally LZ4 (size-prepended)       │
//! └─────────────────────────────────────────┘
//! ```

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Order, OrderId};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Magic bytes for snapshot file identification
const SNAPSHOT_MAGIC: [u8; 4] = *b"ORDB";

/// Current snapshot format version
const SNAPSHOT_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Compression type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Compression {
    None = 0,
    #[default]
    Lz4 = 1,
}

impl TryFrom<u8> for Compression {
    type Error = StorageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            _ => Err(StorageError::InvalidSnapshot(format!(
                "Unknown compression type: {}",
                value
            ))),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "lz4" => Ok(Compression::Lz4),
            other => Err(StorageError::Config(format!(
                "Unknown compression '{}', expected 'lz4' or 'none'",
                other
            ))),
        }
    }
}

/// Snapshot file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version
    pub version: u16,
    /// Compression used for the body
    pub compression: Compression,
    /// Number of orders in the body
    pub record_count: u32,
    /// Size of the stored body in bytes
    pub body_len: u32,
    /// CRC32 of the stored body
    pub body_checksum: u32,
}

impl SnapshotHeader {
    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&SNAPSHOT_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compression as u8;
        // byte 7 reserved
        buf[8..12].copy_from_slice(&self.record_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.body_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.body_checksum.to_le_bytes());
        // bytes 20-27 reserved

        let checksum = crc32fast::hash(&buf[0..28]);
        buf[28..32].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Parse header from bytes
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> StorageResult<Self> {
        if buf[0..4] != SNAPSHOT_MAGIC {
            return Err(StorageError::InvalidSnapshot(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let stored_checksum = read_u32(buf, 28);
        let computed_checksum = crc32fast::hash(&buf[0..28]);
        if stored_checksum != computed_checksum {
            return Err(StorageError::Corruption(format!(
                "Header checksum mismatch: stored={}, computed={}",
                stored_checksum, computed_checksum
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version == 0 || version > SNAPSHOT_VERSION {
            return Err(StorageError::InvalidSnapshot(format!(
                "Unsupported version: {}",
                version
            )));
        }

        Ok(Self {
            version,
            compression: Compression::try_from(buf[6])?,
            record_count: read_u32(buf, 8),
            body_len: read_u32(buf, 12),
            body_checksum: read_u32(buf, 16),
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// On-disk form of one order
///
/// Dates are stored as days from the common era so no textual format is
/// involved; weights keep their full f64 bit pattern.
#[derive(Debug, Serialize, Deserialize)]
struct EncodedOrder {
    id: OrderId,
    address: String,
    days_from_ce: i32,
    weight: f64,
}

impl From<&Order> for EncodedOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            address: order.address.clone(),
            days_from_ce: order.date.num_days_from_ce(),
            weight: order.weight,
        }
    }
}

impl TryFrom<EncodedOrder> for Order {
    type Error = StorageError;

    fn try_from(encoded: EncodedOrder) -> Result<Self, Self::Error> {
        let date = NaiveDate::from_num_days_from_ce_opt(encoded.days_from_ce).ok_or_else(|| {
            StorageError::Corruption(format!(
                "Order {} has out-of-range date ({} days from CE)",
                encoded.id, encoded.days_from_ce
            ))
        })?;

        Ok(Order {
            id: encoded.id,
            address: encoded.address,
            date,
            weight: encoded.weight,
        })
    }
}

/// Encodes and decodes full snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotCodec {
    compression: Compression,
}

impl SnapshotCodec {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Compression applied when encoding
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Encode a sequence of orders into snapshot bytes
    pub fn encode(&self, orders: &[Order]) -> StorageResult<Vec<u8>> {
        let record_count = u32::try_from(orders.len()).map_err(|_| {
            StorageError::Serialization(format!("Too many orders for one snapshot: {}", orders.len()))
        })?;

        let encoded: Vec<EncodedOrder> = orders.iter().map(EncodedOrder::from).collect();
        let serialized = bincode::serialize(&encoded)?;

        let body = match self.compression {
            Compression::None => serialized,
            Compression::Lz4 => lz4_flex::compress_prepend_size(&serialized),
        };

        let body_len = u32::try_from(body.len()).map_err(|_| {
            StorageError::Serialization(format!("Snapshot body too large: {} bytes", body.len()))
        })?;

        let header = SnapshotHeader {
            version: SNAPSHOT_VERSION,
            compression: self.compression,
            record_count,
            body_len,
            body_checksum: crc32fast::hash(&body),
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode snapshot bytes back into orders, in the order they were encoded
    ///
    /// The compression recorded in the header wins over this codec's setting,
    /// so an lz4 codec reads uncompressed snapshots and vice versa.
    pub fn decode(&self, bytes: &[u8]) -> StorageResult<Vec<Order>> {
        let header_bytes: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                StorageError::InvalidSnapshot(format!(
                    "Truncated header: {} bytes, need {}",
                    bytes.len(),
                    HEADER_SIZE
                ))
            })?;
        let header = SnapshotHeader::from_bytes(header_bytes)?;

        let body = &bytes[HEADER_SIZE..];
        if body.len() != header.body_len as usize {
            return Err(StorageError::InvalidSnapshot(format!(
                "Body length mismatch: header says {}, found {}",
                header.body_len,
                body.len()
            )));
        }

        let computed = crc32fast::hash(body);
        if computed != header.body_checksum {
            return Err(StorageError::Corruption(format!(
                "Body checksum mismatch: stored={}, computed={}",
                header.body_checksum, computed
            )));
        }

        let serialized = match header.compression {
            Compression::None => body.to_vec(),
            Compression::Lz4 => lz4_flex::decompress_size_prepended(body).map_err(|e| {
                StorageError::Compression(format!("LZ4 decompression failed: {}", e))
            })?,
        };

        let encoded: Vec<EncodedOrder> = bincode::deserialize(&serialized)?;
        if encoded.len() != header.record_count as usize {
            return Err(StorageError::Corruption(format!(
                "Record count mismatch: header says {}, body has {}",
                header.record_count,
                encoded.len()
            )));
        }

        encoded.into_iter().map(Order::try_from).collect()
    }
}
