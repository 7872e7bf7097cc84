//! Flat key-value persistence.
//!
//! The automation persists two keys, [`KEY_ENABLED`] and
//! [`KEY_SELECTED_IDS`]; the coordinator owns [`KEY_STATISTICS`]. All share
//! one store so a host can keep them in a single file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::result::{SweepError, SweepResult};

/// Automation mode flag
pub const KEY_ENABLED: &str = "enabled";
/// Persisted selection, a flat list of identifiers
pub const KEY_SELECTED_IDS: &str = "selectedIds";
/// Usage statistics (coordinator-owned)
pub const KEY_STATISTICS: &str = "statistics";

/// Key-value store of JSON values
pub trait Store: Send + Sync {
    /// Value under `key`, `None` when absent
    fn get(&self, key: &str) -> SweepResult<Option<Value>>;

    /// Replace the value under `key`
    fn set(&self, key: &str, value: Value) -> SweepResult<()>;
}

/// Typed read; a value that does not decode counts as absent
pub fn load<T: DeserializeOwned>(store: &dyn Store, key: &str) -> SweepResult<Option<T>> {
    let Some(value) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(typed) => Ok(Some(typed)),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring undecodable stored value");
            Ok(None)
        }
    }
}

/// Typed write
pub fn save<T: Serialize + ?Sized>(store: &dyn Store, key: &str, value: &T) -> SweepResult<()> {
    store.set(key, serde_json::to_value(value)?)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all entries
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values().clone()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> SweepResult<Option<Value>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> SweepResult<()> {
        self.values().insert(key.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// JSON FILE STORE
// =============================================================================

/// Store backed by one JSON object file
///
/// Every write rewrites the whole file through a sibling temp file and a
/// rename, so a crash never leaves a half-written state file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> SweepResult<Map<String, Value>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(SweepError::storage(format!(
                "{} holds {} instead of an object",
                self.path.display(),
                kind_of(&other)
            ))),
        }
    }

    fn write_all(&self, values: &Map<String, Value>) -> SweepResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> SweepResult<Option<Value>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> SweepResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        self.write_all(&values)
    }
}
