//! Gatecrash Storage - settings and usage persistence.
//!
//! This crate provides the persistence layer for Gatecrash:
//!
//! - A scoped key/value store (`Synced` settings, `Local` install data)
//!   with in-memory and atomic JSON-file backends
//! - `ConfigStore`, the cached owner of the persisted settings
//! - Daily bypass counters keyed by date
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatecrash_storage::{ConfigStore, MemoryStore};
//!
//! let config = ConfigStore::new(Arc::new(MemoryStore::new()));
//! config.add_custom_site("blog.example").unwrap();
//! assert!(config.enabled());
//! ```

pub mod config_store;
pub mod error;
pub mod kv;

pub use config_store::{usage_key, ConfigStore, SETTINGS_KEY, USAGE_KEY_PREFIX};
pub use error::{Result, StorageError};
pub use kv::{default_data_dir, JsonFileStore, KvStore, MemoryStore, StorageScope};
