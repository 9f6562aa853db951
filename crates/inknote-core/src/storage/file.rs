//! File-backed key-value store.

use super::{KeyValueStore, StorageError, StorageResult};
use crate::config::DEFAULT_FAST_STORE_QUOTA_BYTES;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File-backed key-value store.
///
/// Stores each key as a `.json` file in a directory. Writes go through a
/// temporary file and a rename so a crash never leaves a half-written value.
pub struct FileKeyValue {
    /// Base directory for values.
    base_path: PathBuf,
    quota: usize,
    /// Serializes quota checks with writes.
    write_lock: Mutex<()>,
}

impl FileKeyValue {
    /// Create a store in the given directory with the default quota.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        Self::with_quota(base_path, DEFAULT_FAST_STORE_QUOTA_BYTES)
    }

    /// Create a store in the given directory holding at most `quota` bytes.
    pub fn with_quota(base_path: PathBuf, quota: usize) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            quota,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the file path for a key.
    fn item_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be safe for filenames
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Bytes used by every value except the one at `skip`.
    fn used_bytes_except(&self, skip: &Path) -> StorageResult<usize> {
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;
        let mut used = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == skip || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let stem_len = path.file_stem().map(|s| s.len()).unwrap_or(0);
            let size = entry.metadata().map(|m| m.len() as usize).unwrap_or(0);
            used += stem_len + size;
        }
        Ok(used)
    }
}

impl KeyValueStore for FileKeyValue {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))?;
        let path = self.item_path(key);

        let needed = self.used_bytes_except(&path)? + key.len() + value.len();
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                needed,
                quota: self.quota,
            });
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let path = self.item_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}
