//! Index Manager - Coordinates the secondary indexes
//!
//! Provides a unified interface to:
//! - address index (address → ids, address used as-is)
//! - date index (`dd.MM.yyyy` → ids)
//! - weight index (exact f64 bits → ids)
//!
//! Every order is indexed or unindexed in all three at once; there is no way
//! to touch a single index from outside this type.

use crate::index::{DateKey, FieldIndex, WeightKey};
use crate::storage::types::{Order, OrderId};
use chrono::NaiveDate;

/// Coordinates all secondary index types
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    /// address → ids
    address_index: FieldIndex<String>,
    /// normalized date → ids
    date_index: FieldIndex<DateKey>,
    /// weight bits → ids
    weight_index: FieldIndex<WeightKey>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Query Methods ====================

    /// Ids of orders at an address
    pub fn find_by_address(&self, address: &str) -> &[OrderId] {
        self.address_index.get(address)
    }

    /// Ids of orders on a date
    pub fn find_by_date(&self, date: NaiveDate) -> &[OrderId] {
        self.date_index.get(&DateKey::from(date))
    }

    /// Ids of orders with exactly this weight
    pub fn find_by_weight(&self, weight: f64) -> &[OrderId] {
        self.weight_index.get(&WeightKey::from(weight))
    }

    /// Detached copy of the address bucket
    pub fn snapshot_address(&self, address: &str) -> Vec<OrderId> {
        self.address_index.snapshot(address)
    }

    /// Detached copy of the date bucket
    pub fn snapshot_date(&self, date: NaiveDate) -> Vec<OrderId> {
        self.date_index.snapshot(&DateKey::from(date))
    }

    /// Detached copy of the weight bucket
    pub fn snapshot_weight(&self, weight: f64) -> Vec<OrderId> {
        self.weight_index.snapshot(&WeightKey::from(weight))
    }

    // ==================== Index Update Methods ====================

    /// Add an order to all three indexes
    pub fn index_order(&mut self, order: &Order) {
        self.address_index.insert(order.address.clone(), order.id);
        self.date_index.insert(DateKey::from(order.date), order.id);
        self.weight_index.insert(WeightKey::from(order.weight), order.id);
    }

    /// Remove an order from all three indexes, keyed by its current values
    ///
    /// Returns false if any index was missing the id, which means the
    /// indexes had already drifted from the primary collection.
    pub fn unindex_order(&mut self, order: &Order) -> bool {
        let by_address = self.address_index.remove(order.address.as_str(), order.id);
        let by_date = self.date_index.remove(&DateKey::from(order.date), order.id);
        let by_weight = self
            .weight_index
            .remove(&WeightKey::from(order.weight), order.id);

        by_address && by_date && by_weight
    }

    /// Clear all indexes
    pub fn clear(&mut self) {
        self.address_index.clear();
        self.date_index.clear();
        self.weight_index.clear();
    }

    // ==================== Introspection ====================

    pub fn address_count(&self) -> usize {
        self.address_index.key_count()
    }

    pub fn date_count(&self) -> usize {
        self.date_index.key_count()
    }

    pub fn weight_count(&self) -> usize {
        self.weight_index.key_count()
    }

    pub(crate) fn address_index(&self) -> &FieldIndex<String> {
        &self.address_index
    }

    pub(crate) fn date_index(&self) -> &FieldIndex<DateKey> {
        &self.date_index
    }

    pub(crate) fn weight_index(&self) -> &FieldIndex<WeightKey> {
        &self.weight_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: OrderId, address: &str, day: u32, weight: f64) -> Order {
        Order::new(
            id,
            address,
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            weight,
        )
    }

    #[test]
    fn test_index_order_touches_all_indexes() {
        let mut manager = IndexManager::new();
        let o = order(1, "5 Elm St", 10, 2.5);

        manager.index_order(&o);

        assert_eq!(manager.find_by_address("5 Elm St"), &[1]);
        assert_eq!(manager.find_by_date(o.date), &[1]);
        assert_eq!(manager.find_by_weight(2.5), &[1]);
    }

    #[test]
    fn test_unindex_order_drops_buckets() {
        let mut manager = IndexManager::new();
        let a = order(1, "5 Elm St", 10, 2.5);
        let b = order(2, "5 Elm St", 11, 3.0);
        manager.index_order(&a);
        manager.index_order(&b);

        assert!(manager.unindex_order(&a));

        assert_eq!(manager.find_by_address("5 Elm St"), &[2]);
        assert!(manager.find_by_date(a.date).is_empty());
        assert!(manager.find_by_weight(2.5).is_empty());
        assert_eq!(manager.address_count(), 1);
        assert_eq!(manager.date_count(), 1);
        assert_eq!(manager.weight_count(), 1);
    }

    #[test]
    fn test_unindex_unknown_order() {
        let mut manager = IndexManager::new();
        assert!(!manager.unindex_order(&order(9, "nowhere", 1, 1.0)));
    }

    #[test]
    fn test_snapshots() {
        let mut manager = IndexManager::new();
        manager.index_order(&order(1, "a", 1, 1.0));
        manager.index_order(&order(2, "a", 1, 1.0));

        assert_eq!(manager.snapshot_address("a"), vec![1, 2]);
        assert_eq!(
            manager.snapshot_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            vec![1, 2]
        );
        assert_eq!(manager.snapshot_weight(1.0), vec![1, 2]);
    }

    #[test]
    fn test_clear() {
        let mut manager = IndexManager::new();
        manager.index_order(&order(1, "a", 1, 1.0));
        manager.clear();

        assert_eq!(manager.address_count(), 0);
        assert_eq!(manager.date_count(), 0);
        assert_eq!(manager.weight_count(), 0);
    }
}
