//! Field Index - Inverted index for one order attribute
//!
//! Maps a normalized field value → bucket of order ids, in the order the ids
//! joined the bucket.
//!
//! # Example
//! ```ignore
//! let mut index = FieldIndex::new();
//! index.insert("5 Elm St".to_string(), 1);
//! index.insert("5 Elm St".to_string(), 2);
//! assert_eq!(index.get("5 Elm St"), &[1, 2]);
//! ```
//!
//! # Design Notes
//! - A bucket is dropped as soon as its last id is removed, so no key ever
//!   maps to an empty bucket.
//! - The index does not know about the primary collection. Callers (the
//!   `IndexManager`) guarantee an id is inserted under a key at most once.

use crate::storage::types::OrderId;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Inverted index for one field
///
/// Provides O(1) expected lookup for key → bucket
#[derive(Debug, Clone)]
pub struct FieldIndex<K> {
    /// key → ids currently holding that key, in insertion order
    buckets: HashMap<K, Vec<OrderId>>,
    /// Total ids across all buckets
    entries: usize,
}

impl<K> Default for FieldIndex<K> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            entries: 0,
        }
    }
}

impl<K: Eq + Hash> FieldIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an id to the bucket for `key`, creating the bucket if needed
    pub fn insert(&mut self, key: K, id: OrderId) {
        let bucket = self.buckets.entry(key).or_default();
        debug_assert!(!bucket.contains(&id), "id {} already indexed", id);
        bucket.push(id);
        self.entries += 1;
    }

    /// Remove an id from the bucket for `key`
    ///
    /// Returns false if the id was not in that bucket. An emptied bucket is
    /// removed together with its key.
    pub fn remove<Q>(&mut self, key: &Q, id: OrderId) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };

        let Some(pos) = bucket.iter().position(|&existing| existing == id) else {
            return false;
        };

        bucket.remove(pos);
        self.entries -= 1;

        if bucket.is_empty() {
            self.buckets.remove(key);
        }

        true
    }

    /// Ids in the bucket for `key` (empty slice if the key is absent)
    pub fn get<Q>(&self, key: &Q) -> &[OrderId]
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Owned copy of the bucket for `key`
    ///
    /// Bulk removal iterates this copy, since removing ids mutates the very
    /// bucket being walked.
    pub fn snapshot<Q>(&self, key: &Q) -> Vec<OrderId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).to_vec()
    }

    /// Check if a key has a bucket
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.buckets.contains_key(key)
    }

    /// Get count of distinct keys
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Get total number of ids across all buckets
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Iterate over (key, bucket) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[OrderId])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Clear the entire index
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.entries = 0;
    }
}
