//! Key/value persistence.
//!
//! Two scopes mirror the two kinds of extension state: `Synced` for
//! settings that follow the user across installs, `Local` for per-install
//! data like usage counters. Each scope is an independent namespace;
//! the same key can hold different values in each.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Persistence scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageScope {
    /// Settings synchronized across installs.
    Synced,
    /// Per-install data.
    Local,
}

impl StorageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageScope::Synced => "synced",
            StorageScope::Local => "local",
        }
    }
}

/// Abstract key/value store over JSON values.
pub trait KvStore: Send + Sync {
    /// Reads a value, `None` if absent.
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<()>;

    /// Removes a value. Removing an absent key is not an error.
    fn remove(&self, scope: StorageScope, key: &str) -> Result<()>;

    /// All keys in a scope, sorted.
    fn keys(&self, scope: StorageScope) -> Result<Vec<String>>;
}

// ==================== In-memory store ====================

/// Volatile store used in tests and as the fallback when no data
/// directory is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    scopes: RwLock<BTreeMap<(StorageScope, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>> {
        let scopes = self.scopes.read().unwrap();
        Ok(scopes.get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<()> {
        let mut scopes = self.scopes.write().unwrap();
        scopes.insert((scope, key.to_string()), value);
        Ok(())
    }

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        let mut scopes = self.scopes.write().unwrap();
        scopes.remove(&(scope, key.to_string()));
        Ok(())
    }

    fn keys(&self, scope: StorageScope) -> Result<Vec<String>> {
        let scopes = self.scopes.read().unwrap();
        Ok(scopes
            .keys()
            .filter(|(s, _)| *s == scope)
            .map(|(_, k)| k.clone())
            .collect())
    }
}

// ==================== File-backed store ====================

/// One JSON file per scope, written atomically (temp file then rename).
///
/// The in-memory map is the source of truth; the file is rewritten on
/// every mutation. Fine for the small data volumes involved here.
pub struct JsonFileStore {
    dir: PathBuf,
    scopes: RwLock<BTreeMap<(StorageScope, String), Value>>,
}

impl JsonFileStore {
    /// Opens (or creates) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let mut scopes = BTreeMap::new();
        for scope in [StorageScope::Synced, StorageScope::Local] {
            let path = Self::scope_path(&dir, scope);
            if path.exists() {
                let raw = fs::read_to_string(&path)?;
                let map: BTreeMap<String, Value> = serde_json::from_str(&raw)?;
                for (key, value) in map {
                    scopes.insert((scope, key), value);
                }
            }
        }
        debug!(dir = %dir.display(), "opened json store");
        Ok(Self {
            dir,
            scopes: RwLock::new(scopes),
        })
    }

    fn scope_path(dir: &Path, scope: StorageScope) -> PathBuf {
        dir.join(format!("{}.json", scope.as_str()))
    }

    /// Serializes one scope's map and swaps it into place.
    fn persist(&self, scope: StorageScope) -> Result<()> {
        let map: BTreeMap<String, Value> = {
            let scopes = self.scopes.read().unwrap();
            scopes
                .iter()
                .filter(|((s, _), _)| *s == scope)
                .map(|((_, k), v)| (k.clone(), v.clone()))
                .collect()
        };
        let path = Self::scope_path(&self.dir, scope);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(&map)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<Value>> {
        let scopes = self.scopes.read().unwrap();
        Ok(scopes.get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: StorageScope, key: &str, value: Value) -> Result<()> {
        {
            let mut scopes = self.scopes.write().unwrap();
            scopes.insert((scope, key.to_string()), value);
        }
        self.persist(scope)
    }

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        let removed = {
            let mut scopes = self.scopes.write().unwrap();
            scopes.remove(&(scope, key.to_string())).is_some()
        };
        if removed {
            self.persist(scope)?;
        }
        Ok(())
    }

    fn keys(&self, scope: StorageScope) -> Result<Vec<String>> {
        let scopes = self.scopes.read().unwrap();
        Ok(scopes
            .keys()
            .filter(|(s, _)| *s == scope)
            .map(|(_, k)| k.clone())
            .collect())
    }
}

/// Default data directory for the file store.
pub fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("io", "gatecrash", "gatecrash")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| StorageError::Config("no home directory available".to_string()))
}
