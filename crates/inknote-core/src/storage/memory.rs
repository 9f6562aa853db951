//! In-memory key-value store.

use super::{KeyValueStore, StorageError, StorageResult};
use crate::config::DEFAULT_FAST_STORE_QUOTA_BYTES;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory key-value store for testing and ephemeral use.
///
/// Keys and values both count against the quota.
pub struct MemoryKeyValue {
    items: RwLock<HashMap<String, String>>,
    quota: usize,
}

impl Default for MemoryKeyValue {
    fn default() -> Self {
        Self::with_quota(DEFAULT_FAST_STORE_QUOTA_BYTES)
    }
}

impl MemoryKeyValue {
    /// Create a new empty store with the default quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store holding at most `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota,
        }
    }

    /// Bytes currently used.
    pub fn used_bytes(&self) -> usize {
        self.items
            .read()
            .map(|items| items.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }
}

impl KeyValueStore for MemoryKeyValue {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let items = self
            .items
            .read()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))?;
        let others: usize = items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let needed = others + key.len() + value.len();
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                needed,
                quota: self.quota,
            });
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))?;
        items.remove(key);
        Ok(())
    }
}
