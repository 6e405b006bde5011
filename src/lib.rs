//! # Cachewright
//!
//! An in-process key/value cache with per-entry TTL, bounded eviction,
//! single-flight fallback loading, cross-key transactions, and lifecycle
//! hooks.
//!
//! A [`Cache`] owns an [`EntryStore`], a background [`janitor`] sweep, a
//! [`Courier`] for coalescing concurrent fallback loads, a pluggable
//! [`EvictionPolicy`], and a [`HookPipeline`] that fans out before/after
//! notifications for every command. Writes that need exclusivity on a key
//! run through a per-cache [`Locksmith`], which also hosts
//! [`Cache::transaction`] sections; the [`LockTable`] backing it is a single
//! process-wide map shared by every cache instance.
//!
//! ```
//! use cachewright::{Cache, CacheConfig};
//!
//! let cache = Cache::<String, i32>::new(CacheConfig::new("example")).unwrap();
//! cache.put("a".to_string(), 1, None).unwrap();
//! assert!(cache.get(&"a".to_string()).unwrap().is_ok());
//! cache.shutdown();
//! ```

pub mod cache;
pub mod config;
pub mod courier;
pub mod custom_command;
pub mod entry;
pub mod error;
pub mod eviction;
pub mod hooks;
pub mod janitor;
pub mod lock_table;
pub mod locksmith;
pub mod registry;
pub mod store;
pub mod warmer;

pub use cache::Cache;
pub use config::{CacheConfig, WarmerSpec};
pub use courier::{Courier, LoaderOutcome};
pub use custom_command::CustomCommand;
pub use entry::{now_millis, Entry, Millis};
pub use error::{CacheError, CommandResult, Outcome};
pub use eviction::{EvictionPolicy, Limit, Lrw};
pub use hooks::{Action, Actions, ClearOrigin, Event, EventOutcome, HookKind, HookSpec, PurgeOrigin};
pub use janitor::Janitor;
pub use lock_table::LockTable;
pub use locksmith::{Locksmith, SharedLocksmith};
pub use registry::Registry;
pub use store::EntryStore;
pub use warmer::Warmer;
