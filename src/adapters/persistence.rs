//! Key-value stores for chapter state.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::{KeyValueStore, StoreError};

/// Preferences file holding a flat JSON object of string values.
///
/// Reads are served from memory; `flush` rewrites the whole file atomically.
/// Flushes are serialized, so the file always holds the newest snapshot.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    flush_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Load the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse preferences: {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
            flush_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
    }

    fn flush(&self) -> Result<(), StoreError> {
        // held through the rename; a snapshot taken later is written later
        let _flushing = self.flush_lock.lock().unwrap_or_else(|e| e.into_inner());

        let json = {
            let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
            serde_json::to_string_pretty(&*values)?
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory store; `flush` snapshots the current values as "durable"
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    flushed: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values as of the last flush
    pub fn flushed(&self) -> HashMap<String, String> {
        self.flushed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
    }

    fn flush(&self) -> Result<(), StoreError> {
        let snapshot = self.values.lock().unwrap_or_else(|e| e.into_inner()).clone();
        *self.flushed.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
        Ok(())
    }
}
