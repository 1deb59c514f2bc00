//! Local durable sink
//!
//! Synchronous key-value storage with a fixed capacity per value. The file
//! store keeps one file per key under an app-data directory; the memory
//! store backs tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Synchronous-write, size-limited, always-available storage. `set` may fail
/// on quota; it must never truncate.
pub trait LocalSink: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

// ============================================================================
// FileStore
// ============================================================================

/// One JSON file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    /// Store rooted in the platform app-data directory.
    pub fn in_app_data() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| Error::Validation("no platform data directory available".into()))?;
        Self::new(base.join("astralog"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are internal identifiers, not user paths; keep them flat.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LocalSink for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename so a crash mid-write never leaves a torn file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory sink with an optional per-value capacity, for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<std::collections::HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(std::collections::HashMap::new()),
            capacity: Some(capacity),
        }
    }
}

impl LocalSink for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if value.len() > capacity {
                return Err(Error::StorageQuota {
                    size: value.len(),
                    limit: capacity,
                });
            }
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert_eq!(store.get("log"), None);
        store.set("log", "{\"objects\":[]}").unwrap();
        assert_eq!(store.get("log").as_deref(), Some("{\"objects\":[]}"));
    }

    #[test]
    fn file_store_flattens_hostile_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("../escape", "x").unwrap();
        assert_eq!(store.get("../escape").as_deref(), Some("x"));
        // Nothing was written outside the store directory.
        assert!(dir.path().join("___escape.json").exists());
    }

    #[test]
    fn memory_store_enforces_capacity() {
        let store = MemoryStore::with_capacity(8);
        store.set("k", "short").unwrap();
        let err = store.set("k", "far too long for the store").unwrap_err();
        assert!(matches!(err, Error::StorageQuota { .. }));
        // The old value survives a rejected write.
        assert_eq!(store.get("k").as_deref(), Some("short"));
    }
}
