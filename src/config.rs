//! `CacheConfig` (§3, §3.1): a builder-style construction struct, validated
//! eagerly so `Cache::new` either returns a fully-valid cache or an error —
//! never a half-configured one.
//!
//! Grounded in the teacher's `GlobalCache::new` eager-construction pattern
//! (`cachelito-core/src/global_cache.rs`): validation happens once, at
//! construction, rather than being re-checked on every command.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::custom_command::CustomCommand;
use crate::entry::Millis;
use crate::error::CacheError;
use crate::eviction::Limit;
use crate::hooks::HookSpec;

/// A warmer attached at construction (§4.10 expansion).
pub struct WarmerSpec<K, V> {
    pub interval: Duration,
    pub run_on_start: bool,
    pub produce: std::sync::Arc<dyn Fn() -> Vec<(K, V, Option<Millis>)> + Send + Sync>,
}

/// Construction parameters for a [`crate::cache::Cache`] (§3).
pub struct CacheConfig<K, V> {
    pub name: String,
    pub default_expiration: Option<Millis>,
    pub janitor_interval: Option<Millis>,
    pub lazy_expiration: bool,
    pub limit: Option<Limit>,
    pub hooks: Vec<HookSpec<K, V>>,
    pub commands: HashMap<String, CustomCommand<V>>,
    pub transactions_enabled: bool,
    pub warmers: Vec<WarmerSpec<K, V>>,
}

impl<K, V> CacheConfig<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_expiration: None,
            janitor_interval: None,
            lazy_expiration: true,
            limit: None,
            hooks: Vec::new(),
            commands: HashMap::new(),
            transactions_enabled: true,
            warmers: Vec::new(),
        }
    }

    pub fn with_default_expiration(mut self, ms: Millis) -> Self {
        self.default_expiration = Some(ms);
        self
    }

    pub fn with_janitor_interval(mut self, ms: Millis) -> Self {
        self.janitor_interval = Some(ms);
        self
    }

    pub fn with_lazy_expiration(mut self, enabled: bool) -> Self {
        self.lazy_expiration = enabled;
        self
    }

    pub fn with_limit(mut self, max_size: usize, reclaim_fraction: f64) -> Self {
        self.limit = Some(Limit { max_size, reclaim_fraction });
        self
    }

    pub fn with_hook(mut self, hook: HookSpec<K, V>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_command(mut self, name: impl Into<String>, command: CustomCommand<V>) -> Self {
        self.commands.insert(name.into(), command);
        self
    }

    pub fn with_transactions_enabled(mut self, enabled: bool) -> Self {
        self.transactions_enabled = enabled;
        self
    }

    pub fn with_warmer(mut self, warmer: WarmerSpec<K, V>) -> Self {
        self.warmers.push(warmer);
        self
    }

    /// Runs every construction-time check from §3.1, short-circuiting on the
    /// first violation.
    pub fn validate(&self) -> Result<(), CacheError> {
        if let Some(ms) = self.default_expiration {
            if ms == 0 {
                return Err(CacheError::InvalidExpiration(
                    "default_expiration must be positive".to_string(),
                ));
            }
        }

        if let Some(ms) = self.janitor_interval {
            if ms == 0 {
                return Err(CacheError::InvalidOption(
                    "janitor_interval must be positive".to_string(),
                ));
            }
        }

        if let Some(limit) = &self.limit {
            if limit.max_size == 0 {
                return Err(CacheError::InvalidLimit("max_size must be > 0".to_string()));
            }
            if !(limit.reclaim_fraction > 0.0 && limit.reclaim_fraction <= 1.0) {
                return Err(CacheError::InvalidLimit(
                    "reclaim_fraction must lie in (0.0, 1.0]".to_string(),
                ));
            }
        }

        for hook in &self.hooks {
            hook.validate().map_err(CacheError::InvalidHook)?;
        }

        for warmer in &self.warmers {
            if warmer.interval.is_zero() {
                return Err(CacheError::InvalidWarmer("interval must be positive".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config: CacheConfig<String, i32> = CacheConfig::new("c");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_default_expiration_is_rejected() {
        let config: CacheConfig<String, i32> = CacheConfig::new("c").with_default_expiration(0);
        assert!(matches!(config.validate(), Err(CacheError::InvalidExpiration(_))));
    }

    #[test]
    fn zero_janitor_interval_is_rejected() {
        let config: CacheConfig<String, i32> = CacheConfig::new("c").with_janitor_interval(0);
        assert!(matches!(config.validate(), Err(CacheError::InvalidOption(_))));
    }

    #[test]
    fn limit_with_zero_max_size_is_rejected() {
        let config: CacheConfig<String, i32> = CacheConfig::new("c").with_limit(0, 0.5);
        assert!(matches!(config.validate(), Err(CacheError::InvalidLimit(_))));
    }

    #[test]
    fn limit_with_reclaim_fraction_out_of_range_is_rejected() {
        let config: CacheConfig<String, i32> = CacheConfig::new("c").with_limit(10, 1.5);
        assert!(matches!(config.validate(), Err(CacheError::InvalidLimit(_))));

        let config: CacheConfig<String, i32> = CacheConfig::new("c").with_limit(10, 0.0);
        assert!(matches!(config.validate(), Err(CacheError::InvalidLimit(_))));
    }

    #[test]
    fn valid_limit_passes() {
        let config: CacheConfig<String, i32> = CacheConfig::new("c").with_limit(10, 0.5);
        assert!(config.validate().is_ok());
    }
}
