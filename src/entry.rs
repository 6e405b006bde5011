//! The `Entry` record and its TTL arithmetic.
//!
//! Grounded in the teacher's `CacheEntry<R>` (value + insertion timestamp);
//! reworked around millisecond wall-clock fields instead of an opaque
//! `Instant`, since the spec's `touch`/`refresh`/`expire`/`ttl` operations
//! all read and rewrite `modified` and `expiration` directly.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. See [`now_millis`].
pub type Millis = u64;

/// Returns the current wall-clock time in milliseconds since the epoch.
///
/// A cache-wide clock rather than per-entry `Instant`s, because `modified` is
/// compared and rewritten across entries (e.g. LRW ordering) and because the
/// public `ttl`/`expire` operations are expressed as absolute millisecond
/// offsets.
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as Millis
}

/// A single cached record: `{ value, modified, expiration }`.
///
/// `expiration` is `None` for an entry with no TTL, or `Some(ms)` for a
/// lifetime measured from `modified`. The absolute deadline is always
/// `modified + expiration`.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    pub value: V,
    pub modified: Millis,
    pub expiration: Option<Millis>,
}

impl<V> Entry<V> {
    /// Creates a new entry stamped with the current time.
    pub fn new(value: V, expiration: Option<Millis>) -> Self {
        Self {
            value,
            modified: now_millis(),
            expiration,
        }
    }

    /// True iff `expiration` is set and its absolute deadline has passed `now`.
    ///
    /// An entry with no expiration never expires.
    pub fn is_expired_at(&self, now: Millis) -> bool {
        match self.expiration {
            Some(ttl) => self.modified.saturating_add(ttl) <= now,
            None => false,
        }
    }

    /// Convenience wrapper around [`Entry::is_expired_at`] using the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Remaining time-to-live in milliseconds, or `None` if the entry has no expiration.
    ///
    /// The dispatcher only calls this after lazy expiration has already run,
    /// so this saturates at zero rather than returning a signed value.
    pub fn ttl_at(&self, now: Millis) -> Option<Millis> {
        self.expiration
            .map(|ttl| self.modified.saturating_add(ttl).saturating_sub(now))
    }

    /// `touch`: reset `modified` to now while preserving the absolute deadline.
    ///
    /// If the entry has a TTL, `expiration` is rescaled so that
    /// `modified + expiration` is unchanged.
    pub fn touch(&mut self) {
        let now = now_millis();
        if let Some(ttl) = self.expiration {
            let deadline = self.modified.saturating_add(ttl);
            self.expiration = Some(deadline.saturating_sub(now));
        }
        self.modified = now;
    }

    /// `refresh`: reset `modified` to now without adjusting `expiration`,
    /// i.e. restart the TTL countdown from full length.
    pub fn refresh(&mut self) {
        self.modified = now_millis();
    }

    /// `expire(ms)`: sets a new expiration and stamps `modified = now`.
    /// `None` clears the expiration entirely.
    pub fn set_expiration(&mut self, expiration: Option<Millis>) {
        self.modified = now_millis();
        self.expiration = expiration;
    }
}
