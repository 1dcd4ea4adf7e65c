//! JSON-file backed local storage.
//!
//! The whole store is one JSON object (`{"key": "value", ...}`). It is read
//! on first access and rewritten in full after every mutation, so the file
//! on disk always reflects the last successful write.

use crate::{LocalStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

type Items = BTreeMap<String, String>;

/// Local storage persisted to a JSON file.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<Option<Items>>,
}

impl FileStore {
    /// Creates a store backed by the file at `path`. The file is created on
    /// the first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: Mutex::new(None),
        }
    }

    /// Returns the default storage file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("collectpro")
            .join("local_storage.json")
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Items>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> StoreResult<Items> {
        if !self.path.exists() {
            return Ok(Items::new());
        }
        let json = std::fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(Items::new());
        }
        serde_json::from_str(&json).map_err(|e| {
            StoreError::Unavailable(format!("corrupt storage file {}: {e}", self.path.display()))
        })
    }

    fn persist(&self, items: &Items) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, json)?;
        debug!("persisted {} keys to {}", items.len(), self.path.display());
        Ok(())
    }

    /// Runs `f` against the loaded contents, loading them first if needed.
    fn read<R>(&self, f: impl FnOnce(&Items) -> R) -> StoreResult<R> {
        let mut guard = self.lock();
        let items = match guard.take() {
            Some(items) => items,
            None => self.load()?,
        };
        let result = f(&items);
        *guard = Some(items);
        Ok(result)
    }

    /// Applies `f` to a copy of the contents. When `f` reports a change the
    /// copy is written to disk and only then replaces the cached contents,
    /// so a failed write leaves the store as it was.
    fn write(&self, f: impl FnOnce(&mut Items) -> bool) -> StoreResult<()> {
        let mut guard = self.lock();
        let mut next = match guard.as_ref() {
            Some(items) => items.clone(),
            None => self.load()?,
        };
        if f(&mut next) {
            self.persist(&next)?;
        }
        *guard = Some(next);
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.read(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.write(|items| {
            items.insert(key.to_string(), value.to_string()) != Some(value.to_string())
        })
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.write(|items| items.remove(key).is_some())
    }
}
