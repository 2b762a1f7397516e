//! Key-value persistence
//!
//! The engine persists one JSON blob under a well-known key. Hosts can plug
//! in their own store; a file-backed store and an in-memory store ship here.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::SettingsError;

/// Blob storage keyed by string
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`. `Ok(None)` when nothing was stored.
    fn read(&self, key: &str) -> Result<Option<String>, SettingsError>;

    /// Overwrite the blob stored under `key`
    fn write(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted in the platform config directory
    pub fn in_config_dir() -> Self {
        Self::new(Self::default_dir())
    }

    /// Default settings directory (`<config dir>/AmbientSoundscape`)
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("AmbientSoundscape"))
            .unwrap_or_else(|| PathBuf::from("config"))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SettingsError::LoadFailed {
                key: key.to_string(),
                source: Box::new(e),
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        fs::create_dir_all(&self.dir).map_err(|source| SettingsError::DirectoryCreationFailed {
            path: self.dir.display().to_string(),
            source,
        })?;

        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| SettingsError::SaveFailed {
            key: key.to_string(),
            source: Box::new(e),
        })?;

        tracing::debug!("Saved {} to {}", key, path.display());
        Ok(())
    }
}

/// In-memory store, shareable between engine instances to simulate restarts
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw blob (used to exercise malformed or partial records)
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.blobs.lock().insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.blobs.lock().get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, SettingsError> {
        if *self.fail_reads.lock() {
            return Err(SettingsError::LoadFailed {
                key: key.to_string(),
                source: "storage unavailable".into(),
            });
        }
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if *self.fail_writes.lock() {
            return Err(SettingsError::SaveFailed {
                key: key.to_string(),
                source: "storage unavailable".into(),
            });
        }
        self.blobs.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
