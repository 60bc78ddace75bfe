//! In-memory state store.

use std::{collections::HashMap, sync::RwLock};

use lyrebird_core::traits::{StateStore, StoreError};

/// In-memory store implementation.
///
/// Useful for tests and ephemeral sessions. Data is lost on drop.
pub struct MemoryStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .records
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
