//! The Entry Store (§4.1): a concurrent key → [`Entry`] mapping.
//!
//! Grounded in the teacher's `AsyncGlobalCache`, which already uses
//! `dashmap::DashMap` as its backing map for exactly the "concurrent reads
//! and writes without a single global lock" requirement this component
//! carries. Unlike the teacher (whose map is keyed by `String` and values a
//! positional tuple), this store is generic over the caller's key and value
//! types and exposes the predicate-based `select`/`select_count`/
//! `select_delete` trio the janitor and eviction policy need to scan without
//! copying the whole map.

use dashmap::DashMap;
use std::hash::Hash;

use crate::entry::{Entry, Millis};

/// Concurrent store backing a single cache instance.
///
/// `K` must be `Eq + Hash + Clone` (cloned only for bookkeeping, e.g. the
/// locksmith's order queues and the LRW eviction scan); `V` is caller-opaque.
pub struct EntryStore<K, V> {
    map: DashMap<K, Entry<V>>,
}

impl<K, V> Default for EntryStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Point read. May return an entry that is already expired; the caller
    /// (the dispatcher) applies lazy-expiration semantics on top (§4.7).
    pub fn lookup(&self, key: &K) -> Option<Entry<V>>
    where
        V: Clone,
    {
        self.map.get(key).map(|r| r.value().clone())
    }

    /// Blind insert/overwrite. Always succeeds; returns `true` if this
    /// replaced an existing entry.
    pub fn insert(&self, key: K, entry: Entry<V>) -> bool {
        self.map.insert(key, entry).is_some()
    }

    /// Inserts a batch of key/entry pairs. Returns the number that replaced
    /// an existing entry.
    pub fn insert_many(&self, pairs: impl IntoIterator<Item = (K, Entry<V>)>) -> usize {
        let mut replaced = 0;
        for (k, e) in pairs {
            if self.insert(k, e) {
                replaced += 1;
            }
        }
        replaced
    }

    /// Atomic, element-wise update of an existing entry. Returns `false`
    /// without side effects if the key is absent.
    pub fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&mut Entry<V>),
    {
        match self.map.get_mut(key) {
            Some(mut r) => {
                f(r.value_mut());
                true
            }
            None => false,
        }
    }

    /// Removes a key. Returns `true` if it was present.
    pub fn delete(&self, key: &K) -> bool {
        self.map.remove(key).is_some()
    }

    /// Current number of entries, including any not yet swept by the janitor.
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Removes every entry. Returns the count removed.
    pub fn clear(&self) -> usize {
        let n = self.map.len();
        self.map.clear();
        n
    }

    /// Returns a snapshot of keys matching `predicate`, without copying values.
    pub fn select<F>(&self, mut predicate: F) -> Vec<K>
    where
        F: FnMut(&K, &Entry<V>) -> bool,
    {
        self.map
            .iter()
            .filter(|r| predicate(r.key(), r.value()))
            .map(|r| r.key().clone())
            .collect()
    }

    /// Counts entries matching `predicate` without materializing a key vector.
    pub fn select_count<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &Entry<V>) -> bool,
    {
        self.map.iter().filter(|r| predicate(r.key(), r.value())).count()
    }

    /// Deletes every entry matching `predicate`. Returns the count removed.
    ///
    /// Used by the janitor (expired-at-now predicate) and by `clear`/`purge`
    /// override paths; avoids ever materializing the full map just to scan it.
    pub fn select_delete<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &Entry<V>) -> bool,
    {
        let doomed: Vec<K> = self
            .map
            .iter()
            .filter(|r| predicate(r.key(), r.value()))
            .map(|r| r.key().clone())
            .collect();
        let mut removed = 0;
        for key in &doomed {
            if self.map.remove(key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Convenience used by the janitor: delete all entries expired at `now`.
    pub fn select_delete_expired(&self, now: Millis) -> usize {
        self.select_delete(|_, e| e.is_expired_at(now))
    }

    /// Snapshot of `(key, modified)` pairs, used by the LRW eviction policy to
    /// rank entries by recency-of-write without cloning values.
    pub fn modified_snapshot(&self) -> Vec<(K, Millis)> {
        self.map.iter().map(|r| (r.key().clone(), r.value().modified)).collect()
    }
}
