//! The Eviction Policy (§4.6): a per-cache size-bound enforcer, pluggable
//! behind a trait so alternate strategies can be supplied at construction.
//!
//! The trait shape is grounded in the Design Notes' (§9) "dynamic dispatch to
//! policy modules → a policy trait/interface with `on_event`/`enforce`"; the
//! default implementation replaces the teacher's `EvictionPolicy` enum
//! (`FIFO`/`LRU` over an access-ordered map) with least-recently-written
//! ordering over this crate's `modified` timestamp, since entries here are
//! ranked by write recency rather than by access.

use std::hash::Hash;

use crate::hooks::{ClearOrigin, Event, PurgeOrigin};
use crate::store::EntryStore;

/// Size bound configuration (§3: `limit`).
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub max_size: usize,
    pub reclaim_fraction: f64,
}

/// Observes writes and enforces a size bound on the store.
///
/// `enforce` is called by the dispatcher after every command that could grow
/// the store (`put`, `update`, a committing `fetch`). Implementations must
/// ignore events whose origin is their own prior enforcement run, so a
/// self-triggered `Clear`/`Purge` never causes recursive enforcement.
pub trait EvictionPolicy<K, V>: Send + Sync
where
    K: Eq + Hash + Clone,
{
    /// False for events this policy itself produced (`ClearOrigin::Eviction`,
    /// any `Purge`), so the dispatcher knows not to re-run `enforce` for them.
    fn should_trigger(&self, event: &Event<K, V>) -> bool {
        !matches!(
            event,
            Event::Clear { origin: ClearOrigin::Eviction } | Event::Purge { .. }
        )
    }

    /// Brings the store back under `limit.max_size`, reclaiming expired
    /// entries first via `reclaim_expired` before evicting live ones.
    /// Returns the number of live entries this call evicted (excluding
    /// whatever `reclaim_expired` removed).
    fn enforce(&self, store: &EntryStore<K, V>, limit: &Limit, reclaim_expired: &dyn Fn() -> usize) -> usize;
}

/// Least-recently-written: evicts the entries with the oldest `modified`
/// timestamp first.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lrw;

impl<K, V> EvictionPolicy<K, V> for Lrw
where
    K: Eq + Hash + Clone,
{
    fn enforce(&self, store: &EntryStore<K, V>, limit: &Limit, reclaim_expired: &dyn Fn() -> usize) -> usize {
        if store.size() <= limit.max_size {
            return 0;
        }

        reclaim_expired();

        if store.size() <= limit.max_size {
            return 0;
        }

        let reclaim = ((limit.max_size as f64) * limit.reclaim_fraction).floor() as usize;
        let target = limit.max_size.saturating_sub(reclaim);
        let overage = store.size().saturating_sub(target);
        if overage == 0 {
            return 0;
        }

        let mut snapshot = store.modified_snapshot();
        snapshot.sort_by_key(|(_, modified)| *modified);

        let mut evicted = 0;
        for (key, _) in snapshot.into_iter().take(overage) {
            if store.delete(&key) {
                evicted += 1;
            }
        }
        evicted
    }
}

/// Builds the `Event::Clear` the dispatcher fires after an eviction run
/// removed `count` live entries, or `None` if nothing was evicted.
pub fn eviction_clear_event<K, V>(count: usize) -> Option<Event<K, V>> {
    if count == 0 {
        None
    } else {
        Some(Event::Clear { origin: ClearOrigin::Eviction })
    }
}

/// Builds the `Event::Purge` the dispatcher fires after the janitor or lazy
/// expiration removes entries. Kept here alongside `eviction_clear_event`
/// since both are small `Event` constructors used by the same dispatcher
/// call sites.
pub fn purge_event<K, V>(origin: PurgeOrigin) -> Event<K, V> {
    Event::Purge { origin }
}
