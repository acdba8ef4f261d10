//! orderdb Index Structures
//!
//! Secondary indexes over the primary `id → Order` collection:
//!
//! - **FieldIndex**: generic inverted index, key → bucket of order ids
//! - **IndexManager**: the address, date and weight indexes kept in lockstep
//!
//! # Architecture
//!
//! ```text
//! Query: "orders shipped on 10.01.2024"
//!        ↓
//! DateKey::from(date) → "10.01.2024"
//!        ↓
//! date index bucket → [1, 4, 9]   (insertion order)
//!        ↓
//! primary collection → Order{1}, Order{4}, Order{9}
//! ```
//!
//! Keys are normalized before they touch an index, so the key written on
//! insert and the key computed for a lookup always agree.

mod field_index;
mod manager;

pub use field_index::FieldIndex;
pub use manager::IndexManager;

use crate::storage::types::format_date;
use chrono::NaiveDate;

/// Normalized date key (`dd.MM.yyyy`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(String);

impl DateKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(format_date(date))
    }
}

impl std::fmt::Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weight key: the exact bit pattern of the stored `f64`
///
/// No tolerance is applied. `2.5` and `2.5000000000000004` are different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightKey(u64);

impl WeightKey {
    pub fn value(&self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<f64> for WeightKey {
    fn from(weight: f64) -> Self {
        Self(weight.to_bits())
    }
}

impl std::fmt::Display for WeightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Statistics about index usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of live records in the primary collection
    pub records: usize,
    /// Number of distinct addresses indexed
    pub addresses: usize,
    /// Number of distinct dates indexed
    pub dates: usize,
    /// Number of distinct weights indexed
    pub weights: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records, {} addresses, {} dates, {} weights",
            self.records, self.addresses, self.dates, self.weights
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key_normalization() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let key = DateKey::from(date);
        assert_eq!(key.as_str(), "10.01.2024");
        assert_eq!(key, DateKey::from(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
    }

    #[test]
    fn test_weight_key_is_exact() {
        assert_eq!(WeightKey::from(2.5), WeightKey::from(2.5));
        assert_ne!(WeightKey::from(0.1 + 0.2), WeightKey::from(0.3));
        assert_eq!(WeightKey::from(3.0).value(), 3.0);
    }
}
