//! The process-wide Lock Table (§4.2).
//!
//! Grounded in two teacher patterns combined: the `static Lazy<RwLock<...>>`
//! process-wide singleton the teacher uses for `GlobalCache`'s backing maps
//! (`cachelito-core/src/global_cache.rs`), and the named global registry
//! shape of `InvalidationRegistry::global()` in `cachelito-core/src/invalidation.rs`
//! (`Lazy`-backed singleton accessed through a free function). Here the
//! map is keyed by `(cache_id, key_hash)` rather than by name, per the
//! Design Notes' "process-wide ETS-style lock table" re-architecture (§9):
//! a single concurrent hash map with owner tokens as values.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque token identifying whoever currently holds a key's lock.
///
/// Equality of tokens — not identity of threads — is what "owner" means in
/// `writable?`: a caller re-acquiring its own token back-to-back (e.g. a
/// retry loop) is still the owner.
pub type OwnerToken = u64;

static NEXT_OWNER_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Mints a fresh, process-unique owner token.
pub fn next_owner_token() -> OwnerToken {
    NEXT_OWNER_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Hashes an arbitrary cache key down to the `u64` the lock table indexes by.
///
/// Distinct caches share the table but never share a `cache_id`, so a hash
/// collision between two different caches' keys cannot cause a false lock
/// conflict; within one cache, a `DefaultHasher` collision between two
/// distinct keys would (in principle) serialize them unnecessarily, which is
/// safe — at worst it costs throughput, never correctness.
pub fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// The process-wide `(cache_id, key_hash) -> owner` map.
pub struct LockTable {
    locks: DashMap<(u64, u64), OwnerToken>,
}

impl LockTable {
    fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    /// The single process-wide instance.
    pub fn global() -> &'static LockTable {
        static INSTANCE: Lazy<LockTable> = Lazy::new(LockTable::new);
        &INSTANCE
    }

    /// Attempts to install `owner` on every key in `key_hashes`, atomically:
    /// either all succeed or none do. Never blocks.
    ///
    /// A key already held by `owner` itself counts as success (re-entrant).
    pub fn lock(&self, cache_id: u64, key_hashes: &[u64], owner: OwnerToken) -> bool {
        let mut acquired = Vec::with_capacity(key_hashes.len());
        for &kh in key_hashes {
            let entry_key = (cache_id, kh);
            let installed = match self.locks.entry(entry_key) {
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(owner);
                    true
                }
                dashmap::mapref::entry::Entry::Occupied(o) => *o.get() == owner,
            };
            if installed {
                acquired.push(entry_key);
            } else {
                for k in acquired {
                    // Only release locks we just took in this failed attempt;
                    // never release another owner's pre-existing lock.
                    if let Some(v) = self.locks.get(&k) {
                        if *v == owner {
                            drop(v);
                            self.locks.remove(&k);
                        }
                    }
                }
                return false;
            }
        }
        true
    }

    /// Releases the given keys, regardless of current owner.
    ///
    /// Callers only unlock keys they previously locked, so this is safe
    /// without an owner check; the RAII-free explicit call mirrors the
    /// "guards delete on drop, with a panic-safe release path" design note.
    pub fn unlock(&self, cache_id: u64, key_hashes: &[u64]) {
        for &kh in key_hashes {
            self.locks.remove(&(cache_id, kh));
        }
    }

    /// True iff `key_hash` is unlocked, locked by `owner`, or the calling
    /// thread is inside a transactional context for `cache_id`.
    pub fn writable(&self, cache_id: u64, key_hash: u64, owner: OwnerToken) -> bool {
        if in_transaction(cache_id) {
            return true;
        }
        match self.locks.get(&(cache_id, key_hash)) {
            Some(existing) => *existing == owner,
            None => true,
        }
    }
}

thread_local! {
    static TRANSACTION_CACHES: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

/// Marks the calling thread as being inside a transactional section for `cache_id`.
///
/// Nested writes issued from within that callback consult this before ever
/// touching the lock table, so they bypass queueing entirely (§4.3).
pub(crate) fn enter_transaction(cache_id: u64) {
    TRANSACTION_CACHES.with(|cell| cell.borrow_mut().insert(cache_id));
}

pub(crate) fn exit_transaction(cache_id: u64) {
    TRANSACTION_CACHES.with(|cell| {
        cell.borrow_mut().remove(&cache_id);
    });
}

pub(crate) fn in_transaction(cache_id: u64) -> bool {
    TRANSACTION_CACHES.with(|cell| cell.borrow().contains(&cache_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_then_unlock_roundtrip() {
        let table = LockTable::new();
        let owner = next_owner_token();
        assert!(table.lock(1, &[10, 20], owner));
        assert!(!table.writable(1, 10, next_owner_token()));
        table.unlock(1, &[10, 20]);
        assert!(table.writable(1, 10, next_owner_token()));
    }

    #[test]
    fn lock_is_all_or_nothing() {
        let table = LockTable::new();
        let a = next_owner_token();
        let b = next_owner_token();
        assert!(table.lock(1, &[1], a));
        // b cannot acquire [1, 2] because key 1 is held by a.
        assert!(!table.lock(1, &[1, 2], b));
        // key 2 must have been released by the failed attempt.
        assert!(table.writable(1, 2, b));
    }

    #[test]
    fn same_owner_can_relock() {
        let table = LockTable::new();
        let owner = next_owner_token();
        assert!(table.lock(1, &[5], owner));
        assert!(table.lock(1, &[5], owner));
    }

    #[test]
    fn distinct_caches_do_not_conflict() {
        let table = LockTable::new();
        let a = next_owner_token();
        let b = next_owner_token();
        assert!(table.lock(1, &[5], a));
        assert!(table.lock(2, &[5], b));
    }

    #[test]
    fn transaction_context_makes_everything_writable() {
        let table = LockTable::new();
        let a = next_owner_token();
        assert!(table.lock(7, &[1], a));
        assert!(!table.writable(7, 1, next_owner_token()));
        enter_transaction(7);
        assert!(table.writable(7, 1, next_owner_token()));
        exit_transaction(7);
        assert!(!table.writable(7, 1, next_owner_token()));
    }
}
