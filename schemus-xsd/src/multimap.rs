//! Key to set-of-values mapping with idempotent insertion
//!
//! Used for pending schema imports (`namespace -> locations`) and for the
//! record of schema bodies already committed (`namespace -> bodies`).

use std::hash::Hash;

use indexmap::IndexMap;

/// An insertion-ordered map from key to a set of values
///
/// Inserting an already-present `(key, value)` pair is a no-op, which is what
/// makes the schema acquisition closure a monotone fixed point.
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    inner: IndexMap<K, Vec<V>>,
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for MultiMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K: Hash + Eq, V: Eq> Eq for MultiMap<K, V> {}

impl<K: Hash + Eq, V: PartialEq> MultiMap<K, V> {
    pub fn new() -> Self {
        MultiMap {
            inner: IndexMap::new(),
        }
    }

    /// Insert a value under a key; returns `true` if the value was new
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let values = self.inner.entry(key).or_default();
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.inner
            .get(key)
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&[V]> {
        self.inner.get(key).map(|values| values.as_slice())
    }

    /// Remove and return the first key with its values
    pub fn pop(&mut self) -> Option<(K, Vec<V>)> {
        self.inner.shift_remove_index(0)
    }

    /// Merge another map into this one, keeping insertion idempotent
    pub fn merge(&mut self, other: MultiMap<K, V>) {
        for (key, values) in other.inner {
            let target = self.inner.entry(key).or_default();
            for value in values {
                if !target.contains(&value) {
                    target.push(value);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> {
        self.inner.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Hash + Eq, V: PartialEq> Default for MultiMap<K, V> {
    fn default() -> Self {
        MultiMap::new()
    }
}
