//! Core data types for the orderdb store
//!
//! - `Order`: one shipment order (id, address, date, weight)
//! - `OrderId`: the caller-supplied primary key
//! - date helpers for the canonical `dd.MM.yyyy` form

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Caller-supplied unique key of an order. The store never generates ids.
pub type OrderId = i64;

/// Canonical textual date format (`dd.MM.yyyy`), used for display,
/// CLI input, export and as the normalized date index key.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// A single shipment order
///
/// The `id` is fixed for as long as the order lives in a store. Changing
/// any other field goes through `OrderStore::edit`, which re-derives index
/// membership from scratch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique key
    pub id: OrderId,
    /// Delivery address (exact-match lookup key)
    pub address: String,
    /// Shipment date (exact-match lookup key)
    pub date: NaiveDate,
    /// Weight (exact-match lookup key, compared bit-for-bit)
    pub weight: f64,
}

impl Order {
    pub fn new(id: OrderId, address: impl Into<String>, date: NaiveDate, weight: f64) -> Self {
        Self {
            id,
            address: address.into(),
            date,
            weight,
        }
    }

    /// Date rendered in the canonical `dd.MM.yyyy` form
    pub fn formatted_date(&self) -> String {
        format_date(self.date)
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: Address: {}, Date: {}, Weight: {}",
            self.id,
            self.address,
            self.formatted_date(),
            self.weight
        )
    }
}

/// Render a date in the canonical `dd.MM.yyyy` form
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a date in the canonical `dd.MM.yyyy` form
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}
