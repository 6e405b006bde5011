//! Error taxonomy returned from the command dispatcher and raised at
//! cache construction time.
//!
//! Configuration errors (the `Invalid*` variants) are only ever produced by
//! [`crate::config::CacheConfig`] validation and [`crate::cache::Cache::new`];
//! the remaining variants are runtime errors returned from dispatcher calls.

use thiserror::Error;

/// Everything that can go wrong building or operating a [`crate::cache::Cache`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// `invoke`/`execute`/`transaction` addressed a cache name that isn't registered.
    #[error("no cache registered under this name")]
    NoCache,

    /// `invoke` named a command that was never attached at construction.
    #[error("unknown command: {0}")]
    InvalidCommand(String),

    /// A hook spec failed validation (empty `actions`, zero `sync_timeout` on a sync hook, ...).
    #[error("invalid hook configuration: {0}")]
    InvalidHook(String),

    /// `limit.max_size` was zero, or `reclaim_fraction` fell outside `(0, 1]`.
    #[error("invalid limit configuration: {0}")]
    InvalidLimit(String),

    /// `default_expiration` (or a per-call `expiration`) was zero or negative.
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),

    /// A warmer was configured with a non-positive interval.
    #[error("invalid warmer configuration: {0}")]
    InvalidWarmer(String),

    /// An option bag carried an unrecognized or malformed key.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A `select`/`match` predicate could not be evaluated against stored values.
    #[error("invalid match expression: {0}")]
    InvalidMatch(String),

    /// A cache name collided with an already-registered, still-live cache.
    #[error("invalid cache name: {0}")]
    InvalidName(String),

    /// A batch `insert` was given a malformed collection of key/value pairs.
    #[error("invalid key/value pairs: {0}")]
    InvalidPairs(String),

    /// `incr` targeted an entry whose value isn't numeric.
    #[error("value is not numeric")]
    NonNumericValue,

    /// `purge()` was called but the cache was constructed with no janitor.
    #[error("janitor is disabled for this cache")]
    JanitorDisabled,

    /// Reserved for a statistics-presentation layer built on top of this core.
    #[error("statistics are disabled for this cache")]
    StatsDisabled,

    /// The locksmith's worker thread had already shut down when the call arrived.
    #[error("cache is not started")]
    NotStarted,

    /// A loader, custom command, or user callback panicked; the message is the
    /// panic payload, downcast to a string where possible.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A `fetch` loader returned `LoaderOutcome::Error`, or panicked.
    #[error("loader failed: {0}")]
    LoaderFailure(String),
}

/// Result of a command-dispatcher entry point: present, absent, or failed.
///
/// This collapses the `{ ok | missing | error }` three-way tag from the
/// spec's Command Dispatcher section into a single `Result` whose `Ok` arm
/// carries an [`Outcome`].
pub type CommandResult<T> = Result<Outcome<T>, CacheError>;

/// The non-error half of a [`CommandResult`]: either the command produced a
/// value, or the targeted key was (or became) absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Ok(T),
    Missing,
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Outcome::Missing)
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            Outcome::Missing => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Missing => Outcome::Missing,
        }
    }
}

/// Downcasts a `catch_unwind` payload to a human-readable string.
///
/// Used at every dispatcher boundary that invokes caller-supplied code
/// (loaders, custom commands, `execute`/`transaction` callbacks) per the
/// spec's "exceptions are caught at the dispatcher boundary" rule (§7).
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_ok_and_missing() {
        let ok: Outcome<i32> = Outcome::Ok(5);
        let missing: Outcome<i32> = Outcome::Missing;
        assert!(ok.is_ok());
        assert!(!ok.is_missing());
        assert!(missing.is_missing());
        assert_eq!(ok.ok(), Some(5));
        assert_eq!(missing.ok(), None);
    }

    #[test]
    fn outcome_map_preserves_missing() {
        let missing: Outcome<i32> = Outcome::Missing;
        assert_eq!(missing.map(|v| v + 1), Outcome::Missing);
        let ok: Outcome<i32> = Outcome::Ok(1);
        assert_eq!(ok.map(|v| v + 1), Outcome::Ok(2));
    }

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(CacheError::NoCache.to_string(), "no cache registered under this name");
        assert_eq!(CacheError::NonNumericValue.to_string(), "value is not numeric");
    }
}
