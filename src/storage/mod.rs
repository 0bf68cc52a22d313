//! Local blob persistence for the anonymous session.
//!
//! This is the process-side counterpart of a browser's local storage: named
//! string blobs under fixed keys. The engine treats every blob as opaque JSON.

pub mod watcher;

pub use watcher::StorageWatcher;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage watcher error: {0}")]
    Watch(String),
}

pub trait BlobStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Reads `key` as JSON.
///
/// Corrupt blobs are logged and reported as absent so a bad write can never
/// wedge the engine.
pub fn read_json<T: DeserializeOwned>(
    storage: &dyn BlobStorage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "Discarding malformed stored data");
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize + ?Sized>(
    storage: &dyn BlobStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}

/// In-process storage. Used for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStorage for MemoryBlobStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a data directory.
///
/// Writes go through a temp file and a rename so readers in other processes
/// never observe a half-written blob. The last value written per key is
/// remembered so filesystem events caused by this handle can be ignored.
pub struct FileBlobStorage {
    dir: PathBuf,
    own_writes: Mutex<HashMap<String, Option<String>>>,
}

impl FileBlobStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            own_writes: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys are percent-encoded so any user suffix maps to a distinct, portable file name.
    #[must_use]
    pub fn file_name_for(key: &str) -> String {
        format!("{}.json", urlencoding::encode(key))
    }

    /// Inverse of [`Self::file_name_for`]. Returns `None` for non-blob files.
    #[must_use]
    pub fn key_for_path(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') {
            return None;
        }
        let stem = name.strip_suffix(".json")?;
        urlencoding::decode(stem).ok().map(std::borrow::Cow::into_owned)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name_for(key))
    }

    /// True when `current` is exactly what this handle last wrote under `key`.
    pub fn is_own_write(&self, key: &str, current: Option<&str>) -> bool {
        let own = self.own_writes.lock().unwrap_or_else(PoisonError::into_inner);
        own.get(key)
            .is_some_and(|written| written.as_deref() == current)
    }

    fn remember(&self, key: &str, value: Option<&str>) {
        let mut own = self.own_writes.lock().unwrap_or_else(PoisonError::into_inner);
        own.insert(key.to_string(), value.map(ToString::to_string));
    }
}

impl BlobStorage for FileBlobStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", Self::file_name_for(key), uuid::Uuid::new_v4()));

        self.remember(key, Some(value));
        std::fs::write(&tmp, value)?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remember(key, None);
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
