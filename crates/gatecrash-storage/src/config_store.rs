//! Settings persistence and usage counters.
//!
//! `ConfigStore` is the single owner of the persisted `ExtensionState`.
//! It keeps a write-through cache so reads never touch the backing store,
//! and every mutation persists before it is visible to readers.

use std::sync::{Arc, RwLock};

use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use tracing::{debug, warn};

use gatecrash_core::state::ExtensionState;

use crate::error::Result;
use crate::kv::{KvStore, StorageScope};

/// Synced-scope key holding the serialized settings.
pub const SETTINGS_KEY: &str = "settings";

/// Prefix of the local-scope daily usage counter keys.
pub const USAGE_KEY_PREFIX: &str = "usage:";

/// Cached, persistent view of the extension settings.
#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<dyn KvStore>,
    cache: Arc<RwLock<ExtensionState>>,
}

impl ConfigStore {
    /// Opens the store, loading cached settings from the backing store.
    ///
    /// A corrupt or missing settings record falls back to defaults rather
    /// than failing open.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let state = match store.get(StorageScope::Synced, SETTINGS_KEY) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, "corrupt settings record, using defaults");
                    ExtensionState::default()
                }
            },
            Ok(None) => ExtensionState::default(),
            Err(err) => {
                warn!(error = %err, "settings read failed, using defaults");
                ExtensionState::default()
            }
        };
        Self {
            store,
            cache: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns a snapshot of the current settings.
    pub fn state(&self) -> ExtensionState {
        self.cache.read().unwrap().clone()
    }

    pub fn enabled(&self) -> bool {
        self.cache.read().unwrap().enabled
    }

    pub fn custom_sites(&self) -> Vec<String> {
        self.cache.read().unwrap().custom_sites.clone()
    }

    /// Flips the enabled flag. Returns the new value.
    pub fn toggle(&self) -> Result<bool> {
        self.mutate(|state| state.toggle())
    }

    /// Adds a custom site. Returns false if it was already present.
    pub fn add_custom_site(&self, domain: &str) -> Result<bool> {
        self.mutate(|state| state.add_custom_site(domain))
    }

    /// Removes a custom site. Returns false if it was not present.
    pub fn remove_custom_site(&self, domain: &str) -> Result<bool> {
        self.mutate(|state| state.remove_custom_site(domain))
    }

    /// Applies a partial settings object. Returns true if anything changed.
    pub fn apply_settings(&self, settings: &Value) -> Result<bool> {
        self.mutate(|state| state.apply_settings(settings))
    }

    /// Runs a mutation against the cached state, persisting the result
    /// before the cache is updated. On a persistence failure the cache
    /// keeps the previous state.
    fn mutate<T>(&self, f: impl FnOnce(&mut ExtensionState) -> T) -> Result<T> {
        let mut cache = self.cache.write().unwrap();
        let mut next = cache.clone();
        let out = f(&mut next);
        self.store.set(
            StorageScope::Synced,
            SETTINGS_KEY,
            serde_json::to_value(&next)?,
        )?;
        *cache = next;
        Ok(out)
    }

    // ==================== Usage counters ====================

    /// Increments today's bypass counter. Returns the new count.
    pub fn record_bypass(&self) -> Result<u64> {
        self.record_bypass_on(Local::now().date_naive())
    }

    /// Increments the bypass counter for a specific day.
    pub fn record_bypass_on(&self, date: NaiveDate) -> Result<u64> {
        let key = usage_key(date);
        let count = self
            .store
            .get(StorageScope::Local, &key)?
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;
        self.store.set(StorageScope::Local, &key, json!(count))?;
        debug!(key = %key, count, "recorded bypass");
        Ok(count)
    }

    /// Returns today's bypass count.
    pub fn usage_today(&self) -> Result<u64> {
        self.usage_on(Local::now().date_naive())
    }

    /// Returns the bypass count for a specific day.
    pub fn usage_on(&self, date: NaiveDate) -> Result<u64> {
        Ok(self
            .store
            .get(StorageScope::Local, &usage_key(date))?
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }

    /// Drops usage counters older than `keep_days` days.
    pub fn prune_usage(&self, keep_days: u32) -> Result<usize> {
        let cutoff = Local::now().date_naive() - chrono::Duration::days(keep_days as i64);
        let mut pruned = 0;
        for key in self.store.keys(StorageScope::Local)? {
            let Some(raw) = key.strip_prefix(USAGE_KEY_PREFIX) else {
                continue;
            };
            match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) if date < cutoff => {
                    self.store.remove(StorageScope::Local, &key)?;
                    pruned += 1;
                }
                Ok(_) => {}
                Err(_) => warn!(key = %key, "unparseable usage key"),
            }
        }
        Ok(pruned)
    }
}

/// Builds the local-scope key for a day's usage counter.
pub fn usage_key(date: NaiveDate) -> String {
    format!("{}{}", USAGE_KEY_PREFIX, date.format("%Y-%m-%d"))
}
