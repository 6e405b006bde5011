//! The Courier (§4.4): single-flight coalescing for `fetch`'s fallback
//! loader, so N concurrent misses on the same key run the loader once.
//!
//! Grounded in the teacher's `InvalidationRegistry` (`cachelito-core/src/
//! invalidation.rs`), which already solves "many callers need to wait on one
//! in-flight operation keyed by identity" with a `DashMap` of wait handles.
//! Here the wait handle is a `parking_lot::Condvar`-backed slot rather than a
//! simple flag, since late arrivals need the loader's actual result, not just
//! a signal that it finished.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::hash::Hash;
use std::sync::Arc;

use crate::entry::Millis;

/// What a fallback loader can decide about the value it produced.
///
/// Grounded in the spec's Design Notes (§9) distinguishing "cache this" from
/// "hand the caller a value but don't store it" from "the load failed".
#[derive(Debug, Clone)]
pub enum LoaderOutcome<V, E> {
    /// Cache the value with the given expiration override (`None` keeps the
    /// cache's default).
    Commit(V, Option<Millis>),
    /// Hand the value back to the caller without storing it.
    Ignore(V),
    /// The load failed; propagated to every waiter as `CacheError::LoaderFailure`.
    Error(E),
}

impl<V, E> LoaderOutcome<V, E> {
    /// Normalizes a bare value (the common case) into `Commit(v, None)`.
    pub fn from_value(value: V) -> Self {
        LoaderOutcome::Commit(value, None)
    }
}

enum Slot<V> {
    Pending,
    Done(Result<(V, Option<Millis>, bool), String>),
}

struct Waitpoint<V> {
    mutex: Mutex<Slot<V>>,
    condvar: Condvar,
}

/// Coalesces concurrent loader invocations for the same key.
///
/// One caller per key becomes the "leader" and actually runs the loader;
/// everyone else arriving while it's in flight blocks on a condvar and
/// receives the leader's result (cloned) instead of running the loader again.
pub struct Courier<K, V> {
    inflight: DashMap<K, Arc<Waitpoint<V>>>,
}

impl<K, V> Default for Courier<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Courier<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self { inflight: DashMap::new() }
    }

    /// Runs `load` for `key`, or waits for a concurrently-running load of the
    /// same key to finish and reuses its outcome.
    ///
    /// Returns `(value, expiration_override, should_commit)`, or an error
    /// message propagated from `LoaderOutcome::Error`/a loader panic.
    pub fn fetch<F, E>(&self, key: &K, load: F) -> Result<(V, Option<Millis>, bool), String>
    where
        F: FnOnce() -> LoaderOutcome<V, E>,
        E: std::fmt::Display,
    {
        let (waitpoint, is_leader) = match self.inflight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(o) => (o.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                let wp = Arc::new(Waitpoint {
                    mutex: Mutex::new(Slot::Pending),
                    condvar: Condvar::new(),
                });
                v.insert(wp.clone());
                (wp, true)
            }
        };

        if !is_leader {
            let mut guard = waitpoint.mutex.lock();
            loop {
                match &*guard {
                    Slot::Pending => waitpoint.condvar.wait(&mut guard),
                    Slot::Done(result) => return result.clone(),
                }
            }
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(load))
            .map_err(crate::error::panic_message)
            .map(|o| match o {
                LoaderOutcome::Commit(v, ttl) => Ok((v, ttl, true)),
                LoaderOutcome::Ignore(v) => Ok((v, None, false)),
                LoaderOutcome::Error(e) => Err(e.to_string()),
            })
            .unwrap_or_else(Err);

        self.inflight.remove(key);
        let mut guard = waitpoint.mutex.lock();
        *guard = Slot::Done(outcome.clone());
        waitpoint.condvar.notify_all();
        outcome
    }

    /// True while a load for `key` is in flight. Exposed for tests and
    /// diagnostics; not part of the command dispatcher's public surface.
    pub fn in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }
}

impl<V: Clone> Clone for Slot<V> {
    fn clone(&self) -> Self {
        match self {
            Slot::Pending => Slot::Pending,
            Slot::Done(r) => Slot::Done(r.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn single_caller_commits_value() {
        let courier: Courier<String, i32> = Courier::new();
        let result = courier
            .fetch::<_, String>(&"k".to_string(), || LoaderOutcome::from_value(7));
        assert_eq!(result.unwrap(), (7, None, true));
    }

    #[test]
    fn ignore_outcome_is_not_committed() {
        let courier: Courier<String, i32> = Courier::new();
        let (_, _, commit) = courier
            .fetch::<_, String>(&"k".to_string(), || LoaderOutcome::Ignore(9))
            .unwrap();
        assert!(!commit);
    }

    #[test]
    fn error_outcome_propagates() {
        let courier: Courier<String, i32> = Courier::new();
        let result = courier.fetch(&"k".to_string(), || {
            LoaderOutcome::<i32, String>::Error("boom".to_string())
        });
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn concurrent_fetches_coalesce_into_one_load() {
        let courier: Arc<Courier<String, i32>> = Arc::new(Courier::new());
        let load_count = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let courier = courier.clone();
                let load_count = load_count.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    courier.fetch::<_, String>(&"shared".to_string(), || {
                        load_count.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        LoaderOutcome::from_value(42)
                    })
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), (42, None, true));
        }
        assert_eq!(load_count.load(Ordering::SeqCst), 1);
        assert!(!courier.in_flight(&"shared".to_string()));
    }

    #[test]
    fn panicking_loader_is_reported_as_an_error_to_all_waiters() {
        let courier: Courier<String, i32> = Courier::new();
        let result = courier.fetch::<_, String>(&"k".to_string(), || panic!("kaboom"));
        assert!(result.is_err());
    }
}
