//! orderdb Store Engine
//!
//! `OrderStore` owns the primary collection (id → Order) and the
//! `IndexManager`, and is the only path through which either changes:
//! - Write path: add / remove / remove_by_* / edit / clear
//! - Read path: find_by_* → index bucket → primary collection
//!
//! After every public call the primary collection and the three secondary
//! indexes describe the same set of orders. Edits never patch an index in
//! place: `edit` is `remove` followed by `add`, so bucket membership is
//! always recomputed from the new values.

use crate::index::{IndexManager, IndexStats};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Order, OrderId};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Indexed in-memory order store
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    /// Primary collection
    orders: HashMap<OrderId, Order>,
    /// Secondary indexes
    index: IndexManager,
}

impl OrderStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Mutations ====================

    /// Insert a new order
    ///
    /// Returns false, leaving the store untouched, if the id is already live.
    pub fn add(&mut self, order: Order) -> bool {
        if self.orders.contains_key(&order.id) {
            tracing::debug!(id = order.id, "Rejected duplicate order id");
            return false;
        }

        self.index.index_order(&order);
        tracing::debug!(id = order.id, address = %order.address, "Added order");
        self.orders.insert(order.id, order);
        true
    }

    /// Remove an order by id, returning it if it was live
    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        let order = self.orders.remove(&id)?;

        if !self.index.unindex_order(&order) {
            tracing::warn!(id, "Secondary index was missing entries for removed order");
        }

        tracing::debug!(id, "Removed order");
        Some(order)
    }

    /// Remove every order at an address, returning how many were removed
    pub fn remove_by_address(&mut self, address: &str) -> usize {
        let ids = self.index.snapshot_address(address);
        self.remove_all(ids)
    }

    /// Remove every order on a date, returning how many were removed
    pub fn remove_by_date(&mut self, date: NaiveDate) -> usize {
        let ids = self.index.snapshot_date(date);
        self.remove_all(ids)
    }

    /// Remove every order with exactly this weight, returning how many were removed
    pub fn remove_by_weight(&mut self, weight: f64) -> usize {
        let ids = self.index.snapshot_weight(weight);
        self.remove_all(ids)
    }

    fn remove_all(&mut self, ids: Vec<OrderId>) -> usize {
        ids.into_iter()
            .filter(|&id| self.remove(id).is_some())
            .count()
    }

    /// Replace the address, date and weight of a live order
    ///
    /// Returns false if the id is not live.
    pub fn edit(
        &mut self,
        id: OrderId,
        address: impl Into<String>,
        date: NaiveDate,
        weight: f64,
    ) -> bool {
        if self.remove(id).is_none() {
            return false;
        }

        self.add(Order::new(id, address, date, weight))
    }

    /// Remove every order and every index entry
    pub fn clear(&mut self) {
        self.orders.clear();
        self.index.clear();
        tracing::debug!("Cleared order store");
    }

    // ==================== Queries ====================

    /// Look up an order by id
    pub fn find_by_id(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// All orders at an address, in bucket order
    pub fn find_by_address(&self, address: &str) -> Vec<Order> {
        self.resolve(self.index.find_by_address(address))
    }

    /// All orders on a date, in bucket order
    pub fn find_by_date(&self, date: NaiveDate) -> Vec<Order> {
        self.resolve(self.index.find_by_date(date))
    }

    /// All orders with exactly this weight, in bucket order
    pub fn find_by_weight(&self, weight: f64) -> Vec<Order> {
        self.resolve(self.index.find_by_weight(weight))
    }

    fn resolve(&self, ids: &[OrderId]) -> Vec<Order> {
        ids.iter()
            .filter_map(|id| self.orders.get(id))
            .cloned()
            .collect()
    }

    /// Snapshot of every live order, sorted by id
    pub fn all_records(&self) -> Vec<Order> {
        let mut records: Vec<Order> = self.orders.values().cloned().collect();
        records.sort_by_key(|o| o.id);
        records
    }

    /// Check if an id is live
    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    /// Number of live orders
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Get store statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            records: self.orders.len(),
            addresses: self.index.address_count(),
            dates: self.index.date_count(),
            weights: self.index.weight_count(),
        }
    }

    /// Check that the primary collection and secondary indexes agree
    ///
    /// Every live order must appear exactly once in the bucket for each of
    /// its field values, every indexed id must be live under that key, and
    /// no bucket may be empty.
    pub fn verify_integrity(&self) -> StorageResult<()> {
        use crate::index::{DateKey, WeightKey};

        let expected = self.orders.len();

        verify_field(
            "address",
            self.index.address_index().iter(),
            self.index.address_index().entry_count(),
            expected,
            |key, id| self.orders.get(&id).is_some_and(|o| o.address == *key),
        )?;
        verify_field(
            "date",
            self.index.date_index().iter(),
            self.index.date_index().entry_count(),
            expected,
            |key, id| {
                self.orders
                    .get(&id)
                    .is_some_and(|o| DateKey::from(o.date) == *key)
            },
        )?;
        verify_field(
            "weight",
            self.index.weight_index().iter(),
            self.index.weight_index().entry_count(),
            expected,
            |key, id| {
                self.orders
                    .get(&id)
                    .is_some_and(|o| WeightKey::from(o.weight) == *key)
            },
        )?;

        Ok(())
    }
}

/// Check one secondary index against the primary collection.
///
/// `matches(key, id)` must hold for every indexed pair; together with the
/// entry count equalling the live count (and no duplicate ids) this means
/// each live order sits in exactly one bucket.
fn verify_field<'a, K: std::fmt::Debug + 'a>(
    name: &str,
    buckets: impl Iterator<Item = (&'a K, &'a [OrderId])>,
    entries: usize,
    expected: usize,
    matches: impl Fn(&K, OrderId) -> bool,
) -> StorageResult<()> {
    if entries != expected {
        return Err(StorageError::Corruption(format!(
            "{} index holds {} entries, primary collection has {} orders",
            name, entries, expected
        )));
    }

    let mut seen = std::collections::HashSet::with_capacity(expected);

    for (key, ids) in buckets {
        if ids.is_empty() {
            return Err(StorageError::Corruption(format!(
                "{} index holds empty bucket for {:?}",
                name, key
            )));
        }

        for &id in ids {
            if !matches(key, id) {
                return Err(StorageError::Corruption(format!(
                    "{} index maps {:?} to order {} which is not live under that key",
                    name, key, id
                )));
            }
            if !seen.insert(id) {
                return Err(StorageError::Corruption(format!(
                    "{} index holds order {} more than once",
                    name, id
                )));
            }
        }
    }

    if seen.len() != entries {
        return Err(StorageError::Corruption(format!(
            "{} index counts {} entries but its buckets hold {}",
            name,
            entries,
            seen.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ids(orders: &[Order]) -> Vec<OrderId> {
        orders.iter().map(|o| o.id).collect()
    }

    fn sample_store() -> OrderStore {
        let mut store = OrderStore::new();
        assert!(store.add(Order::new(1, "5 Elm St", date(2024, 1, 10), 2.5)));
        assert!(store.add(Order::new(2, "5 Elm St", date(2024, 2, 1), 3.0)));
        assert!(store.add(Order::new(3, "9 Oak Ave", date(2024, 1, 10), 3.0)));
        store
    }

    #[test]
    fn test_add_and_find() {
        let store = sample_store();

        assert_eq!(store.len(), 3);
        assert_eq!(store.find_by_id(2).unwrap().address, "5 Elm St");
        assert!(store.find_by_id(42).is_none());

        assert_eq!(ids(&store.find_by_address("5 Elm St")), vec![1, 2]);
        assert_eq!(ids(&store.find_by_date(date(2024, 1, 10))), vec![1, 3]);
        assert_eq!(ids(&store.find_by_weight(3.0)), vec![2, 3]);
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_find_absent_key_is_empty() {
        let store = sample_store();

        assert!(store.find_by_address("nowhere").is_empty());
        assert!(store.find_by_date(date(1999, 1, 1)).is_empty());
        assert!(store.find_by_weight(99.0).is_empty());
    }

    #[test]
    fn test_duplicate_add_leaves_store_unchanged() {
        let mut store = sample_store();
        let before = store.all_records();
        let stats_before = store.stats();

        assert!(!store.add(Order::new(1, "elsewhere", date(2030, 5, 5), 8.0)));

        assert_eq!(store.all_records(), before);
        assert_eq!(store.stats(), stats_before);
        assert!(store.find_by_address("elsewhere").is_empty());
        assert!(store.find_by_weight(8.0).is_empty());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_remove_drops_index_references() {
        let mut store = sample_store();

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.id, 1);

        assert!(store.find_by_id(1).is_none());
        assert_eq!(ids(&store.find_by_address("5 Elm St")), vec![2]);
        assert_eq!(ids(&store.find_by_date(date(2024, 1, 10))), vec![3]);
        // weight 2.5 only belonged to order 1, so the bucket is gone
        assert!(store.find_by_weight(2.5).is_empty());
        assert_eq!(store.stats().weights, 1);
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = sample_store();
        let before = store.all_records();

        assert!(store.remove(99).is_none());
        assert_eq!(store.all_records(), before);
    }

    #[test]
    fn test_remove_by_address() {
        let mut store = sample_store();
        let bucket = store.find_by_address("5 Elm St").len();

        let removed = store.remove_by_address("5 Elm St");

        assert_eq!(removed, bucket);
        assert_eq!(store.len(), 1);
        assert!(store.find_by_address("5 Elm St").is_empty());
        assert!(store.find_by_id(3).is_some());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_remove_by_date_and_weight() {
        let mut store = sample_store();

        assert_eq!(store.remove_by_date(date(2024, 1, 10)), 2);
        assert_eq!(ids(&store.all_records()), vec![2]);

        assert_eq!(store.remove_by_weight(3.0), 1);
        assert!(store.is_empty());
        assert_eq!(store.stats(), IndexStats::default());

        assert_eq!(store.remove_by_weight(3.0), 0);
    }

    #[test]
    fn test_edit_moves_buckets() {
        let mut store = sample_store();

        assert!(store.edit(1, "1 New Rd", date(2025, 3, 3), 7.75));

        let edited = store.find_by_id(1).unwrap();
        assert_eq!(edited.address, "1 New Rd");
        assert_eq!(ids(&store.find_by_address("1 New Rd")), vec![1]);
        assert_eq!(ids(&store.find_by_date(date(2025, 3, 3))), vec![1]);
        assert_eq!(ids(&store.find_by_weight(7.75)), vec![1]);

        assert_eq!(ids(&store.find_by_address("5 Elm St")), vec![2]);
        assert_eq!(ids(&store.find_by_date(date(2024, 1, 10))), vec![3]);
        assert!(store.find_by_weight(2.5).is_empty());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_edit_moves_to_end_of_bucket() {
        let mut store = sample_store();

        // same values, but membership is recomputed so id 1 rejoins last
        assert!(store.edit(1, "5 Elm St", date(2024, 1, 10), 2.5));
        assert_eq!(ids(&store.find_by_address("5 Elm St")), vec![2, 1]);
    }

    #[test]
    fn test_edit_absent() {
        let mut store = sample_store();
        assert!(!store.edit(99, "x", date(2024, 1, 1), 1.0));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut store = sample_store();
        store.clear();

        assert!(store.is_empty());
        assert!(store.all_records().is_empty());
        assert_eq!(store.stats(), IndexStats::default());
        store.verify_integrity().unwrap();
    }

    #[test]
    fn test_all_records_sorted() {
        let mut store = OrderStore::new();
        for id in [5, -2, 9, 0] {
            store.add(Order::new(id, "a", date(2024, 1, 1), 1.0));
        }
        assert_eq!(ids(&store.all_records()), vec![-2, 0, 5, 9]);
    }

    #[test]
    fn test_verify_integrity_detects_stale_index_entry() {
        let mut store = sample_store();
        store
            .index
            .index_order(&Order::new(99, "nowhere", date(2024, 3, 3), 9.0));

        let err = store.verify_integrity().unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
    }

    #[test]
    fn test_verify_integrity_detects_unindexed_order() {
        let mut store = sample_store();
        let orphan = Order::new(7, "5 Elm St", date(2024, 1, 10), 2.5);
        store.orders.insert(orphan.id, orphan);

        let err = store.verify_integrity().unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(OrderId, u8, u8, u8),
        Remove(OrderId),
        Edit(OrderId, u8, u8, u8),
        RemoveByAddress(u8),
        RemoveByDate(u8),
        RemoveByWeight(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let id = 0i64..12;
        let v = 0u8..4;
        prop_oneof![
            (id.clone(), v.clone(), v.clone(), v.clone())
                .prop_map(|(i, a, d, w)| Op::Add(i, a, d, w)),
            id.clone().prop_map(Op::Remove),
            (id, v.clone(), v.clone(), v.clone()).prop_map(|(i, a, d, w)| Op::Edit(i, a, d, w)),
            v.clone().prop_map(Op::RemoveByAddress),
            v.clone().prop_map(Op::RemoveByDate),
            v.prop_map(Op::RemoveByWeight),
        ]
    }

    fn addr(v: u8) -> String {
        format!("{} Elm St", v)
    }

    fn day(v: u8) -> NaiveDate {
        date(2024, 1, 1 + v as u32)
    }

    fn weight(v: u8) -> f64 {
        0.5 + v as f64
    }

    proptest! {
        #[test]
        fn prop_indexes_stay_consistent(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut store = OrderStore::new();
            let mut model: std::collections::BTreeMap<OrderId, Order> = Default::default();

            for op in ops {
                match op {
                    Op::Add(id, a, d, w) => {
                        let added = store.add(Order::new(id, addr(a), day(d), weight(w)));
                        prop_assert_eq!(added, !model.contains_key(&id));
                        if added {
                            model.insert(id, Order::new(id, addr(a), day(d), weight(w)));
                        }
                    }
                    Op::Remove(id) => {
                        prop_assert_eq!(store.remove(id).is_some(), model.remove(&id).is_some());
                    }
                    Op::Edit(id, a, d, w) => {
                        let edited = store.edit(id, addr(a), day(d), weight(w));
                        prop_assert_eq!(edited, model.contains_key(&id));
                        if edited {
                            model.insert(id, Order::new(id, addr(a), day(d), weight(w)));
                        }
                    }
                    Op::RemoveByAddress(a) => {
                        let before = model.len();
                        model.retain(|_, o| o.address != addr(a));
                        prop_assert_eq!(store.remove_by_address(&addr(a)), before - model.len());
                    }
                    Op::RemoveByDate(d) => {
                        let before = model.len();
                        model.retain(|_, o| o.date != day(d));
                        prop_assert_eq!(store.remove_by_date(day(d)), before - model.len());
                    }
                    Op::RemoveByWeight(w) => {
                        let before = model.len();
                        model.retain(|_, o| o.weight != weight(w));
                        prop_assert_eq!(store.remove_by_weight(weight(w)), before - model.len());
                    }
                }

                prop_assert!(store.verify_integrity().is_ok());
            }

            let expected: Vec<Order> = model.into_values().collect();
            prop_assert_eq!(store.all_records(), expected);
        }
    }
}
