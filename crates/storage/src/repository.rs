use async_trait::async_trait;
use quiz_core::model::{ConsistencyStatus, SyncKey, SyncState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// String key-value store holding one opaque value per key.
///
/// No transactions: callers that read, modify and write back must
/// serialize those cycles themselves.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Returns whether a value was present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Repository contract for per-user aggregate records.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Load the record for `key`, `None` if the user never synced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is not a
    /// readable record, or other storage errors.
    async fn load(&self, key: &SyncKey) -> Result<Option<SyncState>, StorageError>;

    /// Persist the full record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save(&self, key: &SyncKey, state: &SyncState) -> Result<(), StorageError>;

    /// Delete the record for `key`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn delete(&self, key: &SyncKey) -> Result<bool, StorageError>;
}

/// Stores each record as one JSON document in a [`KvStore`].
#[derive(Clone)]
pub struct JsonSyncStates {
    kv: Arc<dyn KvStore>,
}

impl JsonSyncStates {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl SyncStateRepository for JsonSyncStates {
    async fn load(&self, key: &SyncKey) -> Result<Option<SyncState>, StorageError> {
        let Some(raw) = self.kv.get(key.as_str()).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(format!("{key}: {err}")))
    }

    async fn save(&self, key: &SyncKey, state: &SyncState) -> Result<(), StorageError> {
        let raw = serde_json::to_string(state)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.kv.put(key.as_str(), &raw).await
    }

    async fn delete(&self, key: &SyncKey) -> Result<bool, StorageError> {
        self.kv.delete(key.as_str()).await
    }
}

/// Repository contract for shared per-question consistency statuses.
#[async_trait]
pub trait ConsistencyStatusRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is not a
    /// readable status, or other storage errors.
    async fn get(&self, qid: &str) -> Result<Option<ConsistencyStatus>, StorageError>;

    /// Store `status` under its own qid.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the status cannot be stored.
    async fn put(&self, status: &ConsistencyStatus) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn delete(&self, qid: &str) -> Result<bool, StorageError>;
}

/// Stores each status as one JSON document under `consistency_status:<qid>`.
#[derive(Clone)]
pub struct JsonConsistencyStatuses {
    kv: Arc<dyn KvStore>,
}

impl JsonConsistencyStatuses {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl ConsistencyStatusRepository for JsonConsistencyStatuses {
    async fn get(&self, qid: &str) -> Result<Option<ConsistencyStatus>, StorageError> {
        let key = ConsistencyStatus::storage_key(qid);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(format!("{key}: {err}")))
    }

    async fn put(&self, status: &ConsistencyStatus) -> Result<(), StorageError> {
        let raw = serde_json::to_string(status)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.kv.put(&ConsistencyStatus::storage_key(&status.qid), &raw).await
    }

    async fn delete(&self, qid: &str) -> Result<bool, StorageError> {
        self.kv.delete(&ConsistencyStatus::storage_key(qid)).await
    }
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.remove(key).is_some())
    }
}

/// Aggregate storage handle bundling the key-value backend and the
/// repositories built on it.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KvStore>,
    pub sync_states: Arc<dyn SyncStateRepository>,
    pub consistency_statuses: Arc<dyn ConsistencyStatusRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_kv(Arc::new(InMemoryKv::new()))
    }

    #[must_use]
    pub fn from_kv(kv: Arc<dyn KvStore>) -> Self {
        let sync_states: Arc<dyn SyncStateRepository> =
            Arc::new(JsonSyncStates::new(Arc::clone(&kv)));
        let consistency_statuses: Arc<dyn ConsistencyStatusRepository> =
            Arc::new(JsonConsistencyStatuses::new(Arc::clone(&kv)));
        Self {
            kv,
            sync_states,
            consistency_statuses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{SyncDelta, UserEmail};
    use quiz_core::time::fixed_now;

    fn key() -> SyncKey {
        SyncKey::for_user(&UserEmail::parse("learner@example.com").unwrap())
    }

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let storage = Storage::in_memory();
        let mut state = SyncState::default();
        let delta: SyncDelta =
            serde_json::from_str(r#"{"correctDelta":{"20250926-001":2}}"#).unwrap();
        state.merge(&delta, fixed_now()).unwrap();

        storage.sync_states.save(&key(), &state).await.unwrap();
        let loaded = storage.sync_states.load(&key()).await.unwrap();
        assert_eq!(loaded, Some(state));

        let raw = storage.kv.get("sync:learner@example.com").await.unwrap();
        assert!(raw.unwrap().contains("\"20250926-001\":2"));
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let storage = Storage::in_memory();
        assert_eq!(storage.sync_states.load(&key()).await.unwrap(), None);
        assert!(!storage.sync_states.delete(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_record_is_a_serialization_error() {
        let storage = Storage::in_memory();
        storage
            .kv
            .put("sync:learner@example.com", "{not json")
            .await
            .unwrap();
        let err = storage.sync_states.load(&key()).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        // the bad value is left for inspection
        assert!(storage.kv.get(key().as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn consistency_status_lives_beside_user_records() {
        let storage = Storage::in_memory();
        let status = ConsistencyStatus {
            qid: "20250926-010".into(),
            status_mark: "◎".into(),
            ..ConsistencyStatus::default()
        };
        storage.consistency_statuses.put(&status).await.unwrap();

        let raw = storage.kv.get("consistency_status:20250926-010").await.unwrap();
        assert!(raw.unwrap().contains("\"status_mark\":\"◎\""));
        assert_eq!(
            storage.consistency_statuses.get("20250926-010").await.unwrap(),
            Some(status)
        );
        assert!(storage.consistency_statuses.delete("20250926-010").await.unwrap());
        assert_eq!(storage.consistency_statuses.get("20250926-010").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let storage = Storage::in_memory();
        storage
            .sync_states
            .save(&key(), &SyncState::default())
            .await
            .unwrap();
        assert!(storage.sync_states.delete(&key()).await.unwrap());
        assert_eq!(storage.sync_states.load(&key()).await.unwrap(), None);
    }
}
