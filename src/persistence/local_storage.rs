//! Browser LocalStorage backend (wasm32 only)

use web_sys::Storage;

use super::KeyValueStore;
use crate::error::StorageError;

/// `KeyValueStore` over `window.localStorage`
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<Self, StorageError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| StorageError::Unavailable("localStorage not available".to_string()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // setItem throws QuotaExceededError when full
        self.storage
            .set_item(key, value)
            .map_err(|_| StorageError::QuotaExceeded {
                key: key.to_string(),
                bytes: value.len(),
            })
    }

    fn remove(&mut self, key: &str) {
        let _ = self.storage.remove_item(key);
    }
}
