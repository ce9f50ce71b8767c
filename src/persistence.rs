/// Key-value persistence for engine settings
///
/// Saves and loads volume state between sessions.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;

/// Key-value store primitive consumed by the volume controller
pub trait KeyValueStore: Send {
    fn get_f32(&self, key: &str) -> Option<f32>;
    fn set_f32(&mut self, key: &str, value: f32);
    fn get_i32(&self, key: &str) -> Option<i32>;
    fn set_i32(&mut self, key: &str, value: i32);
    fn has_key(&self, key: &str) -> bool;

    /// Flush pending writes
    fn save(&mut self) -> Result<(), PersistenceError>;
}

/// A persisted value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredValue {
    Float(f32),
    Int(i32),
}

impl StoredValue {
    fn as_f32(&self) -> f32 {
        match *self {
            StoredValue::Float(v) => v,
            StoredValue::Int(v) => v as f32,
        }
    }

    fn as_i32(&self) -> i32 {
        match *self {
            StoredValue::Float(v) => v as i32,
            StoredValue::Int(v) => v,
        }
    }
}

/// Persisted settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    /// Version of the file layout (for future migrations)
    version: u32,
    values: BTreeMap<String, StoredValue>,
}

/// JSON file backed store
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, StoredValue>,
    dirty: bool,
}

impl JsonFileStore {
    /// Current settings file version
    const VERSION: u32 = 1;

    /// Get settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("PooledAudio").join("settings.json"))
    }

    /// Open the store at the default location
    pub fn open_default() -> Result<Self, PersistenceError> {
        let path = Self::default_path().ok_or(PersistenceError::NoConfigDir)?;
        Ok(Self::open(path))
    }

    /// Open the store at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty so the engine falls back to its defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::read(&path) {
            Ok(Some(file)) => {
                if file.version != Self::VERSION {
                    tracing::warn!(
                        "Settings version mismatch: expected {}, found {}",
                        Self::VERSION,
                        file.version
                    );
                }
                tracing::debug!("Loaded settings from: {}", path.display());
                file.values
            }
            Ok(None) => {
                tracing::debug!("No settings found at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!("Using default settings: {}", e);
                BTreeMap::new()
            }
        };

        Self {
            path,
            values,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<Option<SettingsFile>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path).map_err(|source| PersistenceError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file = serde_json::from_str(&json).map_err(|source| PersistenceError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(file))
    }

    fn set(&mut self, key: &str, value: StoredValue) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        self.values.get(key).map(StoredValue::as_f32)
    }

    fn set_f32(&mut self, key: &str, value: f32) {
        self.set(key, StoredValue::Float(value));
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.values.get(key).map(StoredValue::as_i32)
    }

    fn set_i32(&mut self, key: &str, value: i32) {
        self.set(key, StoredValue::Int(value));
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn save(&mut self) -> Result<(), PersistenceError> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }

        let write_err = |source| PersistenceError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let file = SettingsFile {
            version: Self::VERSION,
            values: self.values.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| PersistenceError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(write_err)?;

        self.dirty = false;
        tracing::debug!("Saved settings to: {}", self.path.display());
        Ok(())
    }
}

/// In-memory store, for tests and hosts without a writable disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, StoredValue>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save fails
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl KeyValueStore for MemoryStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        self.values.get(key).map(StoredValue::as_f32)
    }

    fn set_f32(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), StoredValue::Float(value));
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.values.get(key).map(StoredValue::as_i32)
    }

    fn set_i32(&mut self, key: &str, value: i32) {
        self.values.insert(key.to_string(), StoredValue::Int(value));
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn save(&mut self) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError::Rejected("memory store configured to fail".to_string()));
        }
        self.saves += 1;
        Ok(())
    }
}
