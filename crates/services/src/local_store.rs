use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::LocalProgress;

use crate::error::LocalStoreError;

/// Per-device string storage that survives page loads.
pub trait LocalStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `LocalStoreError::Unavailable` if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// # Errors
    ///
    /// Returns `LocalStoreError::Unavailable` if the store rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// Remove `key`, returning the value it held.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Unavailable` if the store cannot be written.
    fn remove(&self, key: &str) -> Result<Option<String>, LocalStoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryLocalStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| LocalStoreError::Unavailable(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| LocalStoreError::Unavailable(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| LocalStoreError::Unavailable(e.to_string()))?;
        Ok(guard.remove(key))
    }
}

/// Keeps the device's [`LocalProgress`] as one JSON value.
///
/// Clones share one lock, so every component of a device that changes
/// progress must hold a clone of the same `ProgressStore`.
#[derive(Clone)]
pub struct ProgressStore {
    store: Arc<dyn LocalStore>,
    update_lock: Arc<Mutex<()>>,
}

impl ProgressStore {
    pub const KEY: &'static str = "quiz_progress";

    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            update_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load, change and save progress as one step.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if progress cannot be read or written; a
    /// failed save leaves the stored value as it was.
    pub fn update<T>(
        &self,
        change: impl FnOnce(&mut LocalProgress) -> T,
    ) -> Result<T, LocalStoreError> {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut progress = self.load()?;
        let out = change(&mut progress);
        self.save(&progress)?;
        Ok(out)
    }

    /// Load saved progress, or a fresh one on first use.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Corrupt` if the saved value cannot be parsed.
    pub fn load(&self) -> Result<LocalProgress, LocalStoreError> {
        match self.store.get(Self::KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(LocalProgress::new()),
        }
    }

    /// # Errors
    ///
    /// Returns `LocalStoreError` if the value cannot be written.
    pub fn save(&self, progress: &LocalProgress) -> Result<(), LocalStoreError> {
        let raw = serde_json::to_string(progress)?;
        self.store.set(Self::KEY, &raw)
    }
}
