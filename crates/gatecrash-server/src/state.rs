//! Application state for the messaging bridge.

use std::sync::{Arc, RwLock};

use tracing::debug;

use gatecrash_core::cookies::{self, CookieStore, MemoryCookieStore};
use gatecrash_core::header_rules::{HeaderRule, HeaderRuleEngine, MemoryRuleHost, RuleHost};
use gatecrash_core::site_registry::SiteRegistry;
use gatecrash_storage::{ConfigStore, KvStore, MemoryStore};

use crate::error::Result;

/// A cookie store usable behind the shared state.
pub trait SharedCookieStore: CookieStore + Send + Sync {}
impl<T: CookieStore + Send + Sync> SharedCookieStore for T {}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Persisted settings and usage counters.
    pub config: ConfigStore,
    /// Bundled site configurations.
    pub registry: Arc<SiteRegistry>,
    /// Header rule engine plus the host rule table it drives.
    engine: Arc<RwLock<HeaderRuleEngine>>,
    rule_host: Arc<RwLock<MemoryRuleHost>>,
    /// Host cookie store swept by `clearCookies`.
    cookies: Arc<RwLock<Box<dyn SharedCookieStore>>>,
}

impl AppState {
    /// Creates state over the given backing store, with in-memory rule
    /// and cookie hosts. Header rules are installed for the stored
    /// settings before the state is returned.
    pub fn new(store: Arc<dyn KvStore>) -> Result<Self> {
        Self::with_cookie_store(store, Box::new(MemoryCookieStore::new()))
    }

    /// Creates state with a caller-supplied cookie store.
    pub fn with_cookie_store(
        store: Arc<dyn KvStore>,
        cookie_store: Box<dyn SharedCookieStore>,
    ) -> Result<Self> {
        let state = Self {
            config: ConfigStore::new(store),
            registry: Arc::new(SiteRegistry::with_defaults()),
            engine: Arc::new(RwLock::new(HeaderRuleEngine::new())),
            rule_host: Arc::new(RwLock::new(MemoryRuleHost::new())),
            cookies: Arc::new(RwLock::new(cookie_store)),
        };
        state.refresh_rules()?;
        Ok(state)
    }

    /// Creates state with volatile storage, for tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new())).expect("in-memory state")
    }

    /// Recomputes and installs the header rule set for the current
    /// settings. Must be called after every settings mutation.
    pub fn refresh_rules(&self) -> Result<()> {
        let mut engine = self.engine.write().unwrap();
        let mut host = self.rule_host.write().unwrap();
        engine.refresh(&mut *host, &self.registry, &self.config.state())?;
        debug!(count = engine.installed().len(), "header rules refreshed");
        Ok(())
    }

    /// The currently installed header rules.
    pub fn installed_rules(&self) -> Vec<HeaderRule> {
        self.engine.read().unwrap().installed().to_vec()
    }

    /// The rule ids currently present in the host table.
    pub fn host_rule_ids(&self) -> Vec<u32> {
        self.rule_host.read().unwrap().rule_ids()
    }

    /// Sweeps all cookies for a domain. Returns the number removed.
    pub fn sweep_cookies(&self, domain: &str) -> usize {
        let mut store = self.cookies.write().unwrap();
        cookies::clear(&mut **store, domain)
    }
}
