//! The Informant / Hook Pipeline (§4.8): fans cache events out to registered
//! observers, before and after the command body runs.
//!
//! Grounded in the teacher's `InvalidationRegistry` (`cachelito-core/src/
//! invalidation.rs`) for the "registered observers keyed by what they react
//! to" shape, re-architected per the Design Notes (§9) from untyped tagged
//! tuples into the `Event` sum type below. The synchronous-with-timeout call
//! pattern ("spawn the hook invocation on a worker pool; select between its
//! completion and a timer; on timeout, abort and move on") is implemented
//! with a detached `std::thread` and an `mpsc` receive-with-timeout, since
//! this crate carries no async runtime — a thread that outlives its timeout
//! is simply abandoned rather than forcibly killed, which Rust cannot do
//! safely to a running thread.

use log::warn;
use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::Millis;

/// One entry per command the dispatcher exposes (§4.9), used both to tag
/// [`Event`] variants and to filter which hooks a given event reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Put,
    Take,
    Update,
    Touch,
    Refresh,
    Expire,
    Del,
    Clear,
    Purge,
    Size,
    Exists,
    Ttl,
    Incr,
    Fetch,
    Execute,
    Transaction,
    Invoke,
}

/// Why a `clear` happened: an explicit caller request, or the eviction
/// policy reclaiming space. Kept distinct per §9.1 so a stats hook can
/// choose to fold self-triggered removals in or filter them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOrigin {
    Explicit,
    Eviction,
}

/// Why a `purge` happened: an explicit caller request, the background
/// janitor, or lazy expiration on a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOrigin {
    Explicit,
    Janitor,
    LazyExpiration,
}

/// The event fired around every dispatcher command, carrying only its
/// arguments. The post-hook pass is the same `Event` plus a separate
/// [`EventOutcome`] (§4.8: "pre hooks ... arguments only; post hooks ...
/// arguments + result").
#[derive(Debug, Clone)]
pub enum Event<K, V> {
    Get { key: K },
    Put { key: K, value: V },
    Take { key: K },
    Update { key: K, value: V },
    Touch { key: K },
    Refresh { key: K },
    Expire { key: K, ms: Option<i64> },
    Del { key: K },
    Clear { origin: ClearOrigin },
    Purge { origin: PurgeOrigin },
    Size,
    Exists { key: K },
    Ttl { key: K },
    Incr { key: K, by: i64, init: V },
    Fetch { key: K },
    Execute,
    Transaction { keys: Vec<K> },
    Invoke { key: K, command: String },
}

impl<K, V> Event<K, V> {
    pub fn action(&self) -> Action {
        match self {
            Event::Get { .. } => Action::Get,
            Event::Put { .. } => Action::Put,
            Event::Take { .. } => Action::Take,
            Event::Update { .. } => Action::Update,
            Event::Touch { .. } => Action::Touch,
            Event::Refresh { .. } => Action::Refresh,
            Event::Expire { .. } => Action::Expire,
            Event::Del { .. } => Action::Del,
            Event::Clear { .. } => Action::Clear,
            Event::Purge { .. } => Action::Purge,
            Event::Size => Action::Size,
            Event::Exists { .. } => Action::Exists,
            Event::Ttl { .. } => Action::Ttl,
            Event::Incr { .. } => Action::Incr,
            Event::Fetch { .. } => Action::Fetch,
            Event::Execute => Action::Execute,
            Event::Transaction { .. } => Action::Transaction,
            Event::Invoke { .. } => Action::Invoke,
        }
    }
}

/// The result half, handed to post-hooks alongside the triggering [`Event`].
#[derive(Debug, Clone)]
pub enum EventOutcome<V> {
    Bool(bool),
    Value(Option<V>),
    Count(usize),
    Ttl(Option<Millis>),
    Unit,
}

/// Which commands a hook reacts to.
#[derive(Debug, Clone)]
pub enum Actions {
    All,
    Only(HashSet<Action>),
}

impl Actions {
    fn matches(&self, action: Action) -> bool {
        match self {
            Actions::All => true,
            Actions::Only(set) => set.contains(&action),
        }
    }
}

/// What a hook wants provisioned to it on cache lifecycle changes. Only
/// `Cache` is modeled here; §4.8 leaves the set open for future provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provision {
    Cache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Pre,
    Post,
    /// Reserved for the `:inspect` family of debug hooks (§9): registered
    /// but never auto-invoked by the pipeline.
    Service,
}

/// One registered observer.
pub struct HookSpec<K, V> {
    pub kind: HookKind,
    pub actions: Actions,
    pub is_async: bool,
    pub sync_timeout: Option<Duration>,
    pub provisions: HashSet<Provision>,
    callback: Arc<dyn Fn(&Event<K, V>, Option<&EventOutcome<V>>) + Send + Sync>,
}

impl<K, V> Clone for HookSpec<K, V> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            actions: self.actions.clone(),
            is_async: self.is_async,
            sync_timeout: self.sync_timeout,
            provisions: self.provisions.clone(),
            callback: self.callback.clone(),
        }
    }
}

impl<K, V> HookSpec<K, V> {
    pub fn new(
        kind: HookKind,
        actions: Actions,
        is_async: bool,
        sync_timeout: Option<Duration>,
        provisions: HashSet<Provision>,
        callback: impl Fn(&Event<K, V>, Option<&EventOutcome<V>>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            actions,
            is_async,
            sync_timeout,
            provisions,
            callback: Arc::new(callback),
        }
    }

    /// Construction-time validation per §3.1: an empty `actions` set (and
    /// not `:all`) or a zero `sync_timeout` on a synchronous hook is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Actions::Only(set) = &self.actions {
            if set.is_empty() {
                return Err("hook actions set is empty".to_string());
            }
        }
        if !self.is_async {
            if let Some(timeout) = self.sync_timeout {
                if timeout.is_zero() {
                    return Err("sync hook sync_timeout must be positive".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Partitions registered hooks by kind and fires pre/post passes around a
/// command body, per §4.8.
pub struct HookPipeline<K, V> {
    pre: Vec<HookSpec<K, V>>,
    post: Vec<HookSpec<K, V>>,
    service: Vec<HookSpec<K, V>>,
}

impl<K, V> Default for HookPipeline<K, V> {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            post: Vec::new(),
            service: Vec::new(),
        }
    }
}

impl<K, V> HookPipeline<K, V>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(specs: Vec<HookSpec<K, V>>) -> Self {
        let mut pipeline = Self::default();
        for spec in specs {
            match spec.kind {
                HookKind::Pre => pipeline.pre.push(spec),
                HookKind::Post => pipeline.post.push(spec),
                HookKind::Service => pipeline.service.push(spec),
            }
        }
        pipeline
    }

    pub fn service_hooks(&self) -> &[HookSpec<K, V>] {
        &self.service
    }

    /// Runs every `pre` hook whose `actions` matches this event, in
    /// registration order, sequentially (§4.8: "a slow sync hook blocks
    /// subsequent hooks in the same event").
    pub fn fire_pre(&self, event: &Event<K, V>) {
        Self::fire(&self.pre, event, None);
    }

    /// Runs every `post` hook whose `actions` matches this event.
    pub fn fire_post(&self, event: &Event<K, V>, outcome: &EventOutcome<V>) {
        Self::fire(&self.post, event, Some(outcome));
    }

    fn fire(hooks: &[HookSpec<K, V>], event: &Event<K, V>, outcome: Option<&EventOutcome<V>>) {
        let action = event.action();
        for hook in hooks {
            if !hook.actions.matches(action) {
                continue;
            }
            if hook.is_async {
                Self::fire_async(hook, event, outcome);
            } else {
                Self::fire_sync(hook, event, outcome);
            }
        }
    }

    fn fire_sync(hook: &HookSpec<K, V>, event: &Event<K, V>, outcome: Option<&EventOutcome<V>>) {
        let Some(timeout) = hook.sync_timeout else {
            Self::invoke(hook, event, outcome);
            return;
        };

        let callback = hook.callback.clone();
        let event = event.clone();
        let outcome = outcome.cloned();
        let (tx, rx) = mpsc::channel::<()>();
        let _ = std::thread::Builder::new()
            .name("cachewright-hook".to_string())
            .spawn(move || {
                let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(&event, outcome.as_ref());
                }));
                if caught.is_err() {
                    warn!("cachewright: hook invocation panicked");
                }
                let _ = tx.send(());
            });

        if rx.recv_timeout(timeout).is_err() {
            warn!("cachewright: sync hook exceeded its sync_timeout and was abandoned");
        }
    }

    fn fire_async(hook: &HookSpec<K, V>, event: &Event<K, V>, outcome: Option<&EventOutcome<V>>) {
        let callback = hook.callback.clone();
        let event = event.clone();
        let outcome = outcome.cloned();
        let _ = std::thread::Builder::new()
            .name("cachewright-hook-async".to_string())
            .spawn(move || {
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(&event, outcome.as_ref());
                }));
            });
    }

    fn invoke(hook: &HookSpec<K, V>, event: &Event<K, V>, outcome: Option<&EventOutcome<V>>) {
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (hook.callback)(event, outcome);
        }));
        if caught.is_err() {
            warn!("cachewright: hook invocation panicked");
        }
    }
}
