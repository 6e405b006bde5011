//! The Command Dispatcher (§4.9): the public `Cache<K, V>` handle tying
//! together the store, lock table, locksmith, courier, janitor, eviction
//! policy, and hook pipeline behind the operations the spec lists.
//!
//! Every operation follows the same five-step shape the spec prescribes:
//! resolve, pre-hooks, perform, post-hooks, tagged result. Grounded in the
//! teacher's `GlobalCache` as the "one struct holds every collaborator,
//! construction validates eagerly" shape, though the collaborators
//! themselves are this crate's, not the teacher's.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::courier::{Courier, LoaderOutcome};
use crate::custom_command::CustomCommand;
use crate::entry::{now_millis, Entry, Millis};
use crate::error::{CacheError, CommandResult, Outcome};
use crate::eviction::{EvictionPolicy, Limit, Lrw};
use crate::hooks::{ClearOrigin, Event, EventOutcome, HookPipeline, PurgeOrigin};
use crate::janitor::Janitor;
use crate::locksmith::{Locksmith, SharedLocksmith};
use crate::registry::Registry;
use crate::store::EntryStore;
use crate::warmer::Warmer;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

fn next_cache_id() -> u64 {
    NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed)
}

/// The command dispatcher for one named cache.
pub struct Cache<K, V> {
    id: u64,
    name: String,
    store: Arc<EntryStore<K, V>>,
    locksmith: SharedLocksmith,
    courier: Courier<K, V>,
    hooks: HookPipeline<K, V>,
    eviction_policy: Option<Arc<dyn EvictionPolicy<K, V>>>,
    limit: Option<Limit>,
    default_expiration: Option<Millis>,
    lazy_expiration: bool,
    commands: HashMap<String, CustomCommand<V>>,
    transactions_enabled: bool,
    janitor: Mutex<Option<Janitor>>,
    warmers: Mutex<Vec<Warmer>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Validates `config` and constructs a fully running cache, registering
    /// it under its name and starting its janitor and warmers (§3.1, §4.10).
    pub fn new(config: CacheConfig<K, V>) -> Result<Arc<Self>, CacheError> {
        config.validate()?;

        let CacheConfig {
            name,
            default_expiration,
            janitor_interval,
            lazy_expiration,
            limit,
            hooks,
            commands,
            transactions_enabled,
            warmers,
        } = config;

        let cache_id = next_cache_id();
        let eviction_policy: Option<Arc<dyn EvictionPolicy<K, V>>> =
            limit.map(|_| Arc::new(Lrw) as Arc<dyn EvictionPolicy<K, V>>);

        let cache = Arc::new(Self {
            id: cache_id,
            name: name.clone(),
            store: Arc::new(EntryStore::new()),
            locksmith: Arc::new(Locksmith::new(cache_id)),
            courier: Courier::new(),
            hooks: HookPipeline::new(hooks),
            eviction_policy,
            limit,
            default_expiration,
            lazy_expiration,
            commands,
            transactions_enabled,
            janitor: Mutex::new(None),
            warmers: Mutex::new(Vec::new()),
        });

        Registry::global().register(&name, cache.clone())?;

        if let Some(interval_ms) = janitor_interval {
            let weak: Weak<Cache<K, V>> = Arc::downgrade(&cache);
            let janitor = Janitor::spawn(
                cache.store.clone(),
                Duration::from_millis(interval_ms),
                name.clone(),
                move |removed| {
                    if removed == 0 {
                        return;
                    }
                    if let Some(cache) = weak.upgrade() {
                        cache.hooks.fire_post(
                            &Event::Purge { origin: PurgeOrigin::Janitor },
                            &EventOutcome::Count(removed),
                        );
                    }
                },
            );
            *cache.janitor.lock() = Some(janitor);
        }

        for warmer_spec in warmers {
            let crate::config::WarmerSpec { interval, run_on_start, produce } = warmer_spec;
            let weak: Weak<Cache<K, V>> = Arc::downgrade(&cache);
            let result = Warmer::spawn(
                interval,
                run_on_start,
                move || produce(),
                move |k, v, ttl| {
                    if let Some(cache) = weak.upgrade() {
                        let _ = cache.put(k, v, ttl);
                    }
                },
            );
            match result {
                Ok(warmer) => cache.warmers.lock().push(warmer),
                Err(err) => {
                    Registry::global().deregister(&name);
                    return Err(err);
                }
            }
        }

        Ok(cache)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lookup_live(&self, key: &K) -> Option<V> {
        let entry = self.store.lookup(key)?;
        if entry.is_expired() {
            if self.lazy_expiration {
                self.store.delete(key);
                self.hooks.fire_post(
                    &Event::Purge { origin: PurgeOrigin::LazyExpiration },
                    &EventOutcome::Count(1),
                );
            }
            None
        } else {
            Some(entry.value)
        }
    }

    /// Runs the eviction policy (if configured) after a command that could
    /// have grown the store, firing a `Clear` event for whatever it removed.
    fn enforce_limit(&self) {
        let (Some(policy), Some(limit)) = (&self.eviction_policy, self.limit) else {
            return;
        };
        let store = &self.store;
        let evicted = policy.enforce(store, &limit, &|| store.select_delete_expired(now_millis()));
        if evicted > 0 {
            self.hooks.fire_post(
                &Event::Clear { origin: ClearOrigin::Eviction },
                &EventOutcome::Count(evicted),
            );
        }
    }

    pub fn get(&self, key: &K) -> CommandResult<V> {
        self.hooks.fire_pre(&Event::Get { key: key.clone() });
        let result = self.lookup_live(key);
        self.hooks.fire_post(
            &Event::Get { key: key.clone() },
            &EventOutcome::Value(result.clone()),
        );
        Ok(match result {
            Some(v) => Outcome::Ok(v),
            None => Outcome::Missing,
        })
    }

    pub fn put(&self, key: K, value: V, expiration: Option<Millis>) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Put { key: key.clone(), value: value.clone() });
        let ttl = expiration.or(self.default_expiration);
        let store = self.store.clone();
        let k = key.clone();
        let v = value.clone();
        self.locksmith
            .execute(&key, move || {
                store.insert(k, Entry::new(v, ttl));
            })
            .map_err(CacheError::from)?;
        self.hooks.fire_post(
            &Event::Put { key: key.clone(), value },
            &EventOutcome::Bool(true),
        );
        self.enforce_limit();
        Ok(Outcome::Ok(true))
    }

    pub fn take(&self, key: &K) -> CommandResult<V> {
        self.hooks.fire_pre(&Event::Take { key: key.clone() });
        let store = self.store.clone();
        let k = key.clone();
        let result = self
            .locksmith
            .execute(key, move || {
                let entry = store.lookup(&k);
                store.delete(&k);
                entry
            })
            .map_err(CacheError::from)?;

        let value = result.filter(|e| !e.is_expired()).map(|e| e.value);
        self.hooks.fire_post(
            &Event::Take { key: key.clone() },
            &EventOutcome::Value(value.clone()),
        );
        Ok(match value {
            Some(v) => Outcome::Ok(v),
            None => Outcome::Missing,
        })
    }

    pub fn update(&self, key: &K, value: V) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Update { key: key.clone(), value: value.clone() });
        let store = self.store.clone();
        let k = key.clone();
        let v = value.clone();
        let updated = self
            .locksmith
            .execute(key, move || store.update(&k, |e| e.value = v))
            .map_err(CacheError::from)?;
        self.hooks.fire_post(
            &Event::Update { key: key.clone(), value },
            &EventOutcome::Bool(updated),
        );
        Ok(if updated { Outcome::Ok(true) } else { Outcome::Missing })
    }

    pub fn touch(&self, key: &K) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Touch { key: key.clone() });
        let store = self.store.clone();
        let k = key.clone();
        let touched = self
            .locksmith
            .execute(key, move || store.update(&k, |e| e.touch()))
            .map_err(CacheError::from)?;
        self.hooks.fire_post(&Event::Touch { key: key.clone() }, &EventOutcome::Bool(touched));
        Ok(if touched { Outcome::Ok(true) } else { Outcome::Missing })
    }

    pub fn refresh(&self, key: &K) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Refresh { key: key.clone() });
        let store = self.store.clone();
        let k = key.clone();
        let refreshed = self
            .locksmith
            .execute(key, move || store.update(&k, |e| e.refresh()))
            .map_err(CacheError::from)?;
        self.hooks.fire_post(&Event::Refresh { key: key.clone() }, &EventOutcome::Bool(refreshed));
        Ok(if refreshed { Outcome::Ok(true) } else { Outcome::Missing })
    }

    /// `ms = None` clears the expiration; `ms <= 0` deletes the key; else
    /// sets `expiration = ms` and restamps `modified = now` (§4.9).
    pub fn expire(&self, key: &K, ms: Option<i64>) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Expire { key: key.clone(), ms });
        let store = self.store.clone();
        let k = key.clone();
        let outcome = self
            .locksmith
            .execute(key, move || match ms {
                None => store.update(&k, |e| e.set_expiration(None)),
                Some(ms) if ms <= 0 => store.delete(&k),
                Some(ms) => store.update(&k, |e| e.set_expiration(Some(ms as Millis))),
            })
            .map_err(CacheError::from)?;
        self.hooks.fire_post(&Event::Expire { key: key.clone(), ms }, &EventOutcome::Bool(outcome));
        Ok(if outcome { Outcome::Ok(true) } else { Outcome::Missing })
    }

    /// Always reports `true`, regardless of prior presence (§4.9).
    pub fn del(&self, key: &K) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Del { key: key.clone() });
        let store = self.store.clone();
        let k = key.clone();
        self.locksmith
            .execute(key, move || store.delete(&k))
            .map_err(CacheError::from)?;
        self.hooks.fire_post(&Event::Del { key: key.clone() }, &EventOutcome::Bool(true));
        Ok(Outcome::Ok(true))
    }

    pub fn clear(&self) -> CommandResult<usize> {
        self.hooks.fire_pre(&Event::Clear { origin: ClearOrigin::Explicit });
        let count = self.store.clear();
        self.hooks.fire_post(
            &Event::Clear { origin: ClearOrigin::Explicit },
            &EventOutcome::Count(count),
        );
        Ok(Outcome::Ok(count))
    }

    /// Runs the janitor sweep inline. Fails with `JanitorDisabled` if this
    /// cache was built with no `janitor_interval` (§4.9, §7).
    pub fn purge(&self) -> CommandResult<usize> {
        if self.janitor.lock().is_none() {
            return Err(CacheError::JanitorDisabled);
        }
        self.hooks.fire_pre(&Event::Purge { origin: PurgeOrigin::Explicit });
        let count = crate::janitor::sweep(&self.store, &self.name);
        self.hooks.fire_post(
            &Event::Purge { origin: PurgeOrigin::Explicit },
            &EventOutcome::Count(count),
        );
        Ok(Outcome::Ok(count))
    }

    pub fn size(&self) -> CommandResult<usize> {
        self.hooks.fire_pre(&Event::Size);
        let size = self.store.size();
        self.hooks.fire_post(&Event::Size, &EventOutcome::Count(size));
        Ok(Outcome::Ok(size))
    }

    pub fn exists(&self, key: &K) -> CommandResult<bool> {
        self.hooks.fire_pre(&Event::Exists { key: key.clone() });
        let present = self.lookup_live(key).is_some();
        self.hooks.fire_post(&Event::Exists { key: key.clone() }, &EventOutcome::Bool(present));
        Ok(Outcome::Ok(present))
    }

    pub fn ttl(&self, key: &K) -> CommandResult<Option<Millis>> {
        self.hooks.fire_pre(&Event::Ttl { key: key.clone() });
        let entry = self.store.lookup(key).filter(|e| !e.is_expired());
        let ttl = entry.as_ref().map(|e| e.ttl_at(now_millis()));
        self.hooks.fire_post(&Event::Ttl { key: key.clone() }, &EventOutcome::Ttl(ttl.flatten()));
        Ok(match entry {
            Some(_) => Outcome::Ok(ttl.flatten()),
            None => Outcome::Missing,
        })
    }

    /// Atomic arithmetic (§4.9): absent keys are seeded with `init` before
    /// adding `by`; a non-numeric existing value is rejected without
    /// mutation (§9.1). `V` must be `TryInto<i64>`/`From<i64>` to serve as
    /// the numeric representation for this cache.
    pub fn incr(&self, key: &K, by: i64, init: i64) -> CommandResult<i64>
    where
        V: TryInto<i64> + From<i64>,
    {
        self.hooks.fire_pre(&Event::Incr { key: key.clone(), by, init: V::from(init) });
        let store = self.store.clone();
        let k = key.clone();
        let ttl = self.default_expiration;
        let result: Result<i64, CacheError> = self
            .locksmith
            .execute(key, move || {
                if let Some(entry) = store.lookup(&k) {
                    if !entry.is_expired() {
                        let current: i64 = entry
                            .value
                            .clone()
                            .try_into()
                            .map_err(|_| CacheError::NonNumericValue)?;
                        let next = current + by;
                        store.update(&k, |e| e.value = V::from(next));
                        return Ok(next);
                    }
                }
                let next = init + by;
                store.insert(k, Entry::new(V::from(next), ttl));
                Ok(next)
            })
            .map_err(CacheError::from)?;

        match &result {
            Ok(n) => self.hooks.fire_post(
                &Event::Incr { key: key.clone(), by, init: V::from(init) },
                &EventOutcome::Count(*n as usize),
            ),
            Err(_) => {}
        }
        result.map(Outcome::Ok)
    }

    /// Lookup with a courier-coalesced fallback loader on miss (§4.4, §4.9).
    pub fn fetch<F, E>(&self, key: &K, loader: F) -> CommandResult<V>
    where
        F: FnOnce() -> LoaderOutcome<V, E> + Send,
        E: std::fmt::Display,
    {
        self.hooks.fire_pre(&Event::Fetch { key: key.clone() });

        if let Some(value) = self.lookup_live(key) {
            self.hooks
                .fire_post(&Event::Fetch { key: key.clone() }, &EventOutcome::Value(Some(value.clone())));
            return Ok(Outcome::Ok(value));
        }

        let outcome = self
            .courier
            .fetch(key, loader)
            .map_err(CacheError::LoaderFailure)?;
        let (value, ttl, commit) = outcome;

        if commit {
            let ttl = ttl.or(self.default_expiration);
            self.put(key.clone(), value.clone(), ttl)?;
        }

        self.hooks.fire_post(
            &Event::Fetch { key: key.clone() },
            &EventOutcome::Value(Some(value.clone())),
        );
        Ok(Outcome::Ok(value))
    }

    /// Runs `f` with no key affinity and no locking (§4.9).
    pub fn execute<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.hooks.fire_pre(&Event::Execute);
        let result = f();
        self.hooks.fire_post(&Event::Execute, &EventOutcome::Unit);
        result
    }

    /// Locks `keys`, runs `f`, unlocks — atomically with respect to other
    /// queued work on this cache (§4.3, §4.9). Fails if this cache was
    /// constructed with `transactions_enabled = false`.
    pub fn transaction<F, R>(&self, keys: &[K], f: F) -> Result<R, CacheError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if !self.transactions_enabled {
            return Err(CacheError::InvalidOption("transactions are disabled for this cache".to_string()));
        }
        self.hooks.fire_pre(&Event::Transaction { keys: keys.to_vec() });
        let result = self.locksmith.transaction(keys, f).map_err(CacheError::from)?;
        self.hooks.fire_post(&Event::Transaction { keys: keys.to_vec() }, &EventOutcome::Unit);
        Ok(result)
    }

    /// Dispatches to a command attached at construction (§4.9).
    ///
    /// A `Read` command never locks; a `Write` command runs under `lock(k)`
    /// and writes `new_value` back unless the key was absent and
    /// `new_value` is `None`. The command's result type `R` is independent of
    /// the cache's value type `V` (§6 scenario 6) — it was boxed by
    /// [`CustomCommand::read`]/[`CustomCommand::write`] and is downcast back
    /// here; a mismatch between `R` and what the command actually produced is
    /// reported as `CacheError::InvalidCommand`.
    pub fn invoke<R>(&self, key: &K, command_name: &str) -> CommandResult<R>
    where
        R: 'static,
    {
        let command = self
            .commands
            .get(command_name)
            .cloned()
            .ok_or_else(|| CacheError::InvalidCommand(command_name.to_string()))?;

        self.hooks.fire_pre(&Event::Invoke { key: key.clone(), command: command_name.to_string() });

        let boxed = match command {
            CustomCommand::Read(f) => {
                let current = self.lookup_live(key);
                f(current.as_ref())
            }
            CustomCommand::Write(f) => {
                let store = self.store.clone();
                let k = key.clone();
                self.locksmith
                    .execute(key, move || {
                        let current = store.lookup(&k).filter(|e| !e.is_expired());
                        let (boxed, new_value) = f(current.as_ref().map(|e| &e.value));
                        match (current.is_some(), new_value) {
                            (_, Some(v)) => {
                                store.insert(k, Entry::new(v, None));
                            }
                            (false, None) => {}
                            (true, None) => {}
                        }
                        boxed
                    })
                    .map_err(CacheError::from)?
            }
        };

        self.hooks.fire_post(
            &Event::Invoke { key: key.clone(), command: command_name.to_string() },
            &EventOutcome::Unit,
        );

        let result = boxed.downcast::<R>().map_err(|_| {
            CacheError::InvalidCommand(format!("{command_name} did not return the expected type"))
        })?;
        Ok(Outcome::Ok(*result))
    }
}

impl<K, V> Cache<K, V> {
    /// Stops the janitor, every warmer, and the locksmith's worker thread,
    /// then deregisters the cache (§5.1). Also run implicitly on `Drop`.
    pub fn shutdown(&self) {
        if let Some(janitor) = self.janitor.lock().as_mut() {
            janitor.shutdown();
        }
        for warmer in self.warmers.lock().iter_mut() {
            warmer.shutdown();
        }
        self.locksmith.shutdown();
        Registry::global().deregister(&self.name);
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
