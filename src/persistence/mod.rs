//! Save/load persistence
//!
//! Features:
//! - `KeyValueStore` seam over LocalStorage (web) or memory (native/tests)
//! - Bounded saved-replay library, oldest evicted first
//! - Evict-and-retry once when a write hits the storage quota
//! - Base64 export/import of single replays

pub mod library;
#[cfg(target_arch = "wasm32")]
pub mod local_storage;

use std::collections::HashMap;

use crate::error::StorageError;

pub use library::{REPLAYS_KEY, ReplayLibrary, SavedReplay};
#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageStore;

/// Minimal string key/value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Fails when the store is full
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str);
}

/// In-memory store with an optional byte quota
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push stored values past `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(bytes),
        }
    }

    pub fn set_quota(&mut self, quota: Option<usize>) {
        self.quota = quota;
    }

    /// Total bytes held in values
    pub fn used_bytes(&self) -> usize {
        self.entries.values().map(String::len).sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let replaced = self.entries.get(key).map(String::len).unwrap_or(0);
            if self.used_bytes() - replaced + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    bytes: value.len(),
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}
