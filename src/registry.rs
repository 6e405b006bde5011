//! The process-wide cache registry (§4.10 expansion): maps a cache's `name`
//! to its shared handle, so `invoke`/`execute`/`transaction` entry points
//! addressed by name resolve to the same underlying store.
//!
//! Grounded in the teacher's `stats_registry` module, a
//! `Lazy<RwLock<HashMap<String, ...>>>` keyed by cache name; re-expressed
//! here with `DashMap` (this crate's concurrent-map default, per
//! [`crate::lock_table::LockTable`]) and `Arc<dyn Any + Send + Sync>` since,
//! unlike the teacher's single-typed stats map, caches in this registry vary
//! in their `K`/`V` type parameters and must be downcast on lookup.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::Arc;

use crate::cache::Cache;
use crate::error::CacheError;

/// The single process-wide name → cache-handle map.
pub struct Registry {
    caches: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Registry {
    fn new() -> Self {
        Self { caches: DashMap::new() }
    }

    pub fn global() -> &'static Registry {
        static INSTANCE: Lazy<Registry> = Lazy::new(Registry::new);
        &INSTANCE
    }

    /// Registers `cache` under `name`. Fails with `CacheError::InvalidName`
    /// if the name is already taken by a still-live cache (§3.1).
    pub fn register<K, V>(&self, name: &str, cache: Arc<Cache<K, V>>) -> Result<(), CacheError>
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        match self.caches.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CacheError::InvalidName(format!("cache name {name:?} is already registered")))
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(cache);
                Ok(())
            }
        }
    }

    /// Removes `name` from the registry. Called when a `Cache` is dropped.
    pub fn deregister(&self, name: &str) {
        self.caches.remove(name);
    }

    /// Looks up a live cache by name, downcasting to the caller's `K`/`V`.
    /// Returns `None` both when the name is unregistered and when it's
    /// registered under a different type pair.
    pub fn lookup<K, V>(&self, name: &str) -> Option<Arc<Cache<K, V>>>
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let entry = self.caches.get(name)?;
        entry.value().clone().downcast::<Cache<K, V>>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }
}
