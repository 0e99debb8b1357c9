use std::sync::Arc;

use quiz_core::model::ConsistencyStatus;
use serde_json::Value;
use storage::repository::{ConsistencyStatusRepository, StorageError};
use tracing::{info, warn};

use crate::error::ConsistencyError;

/// Reads and writes the shared per-question consistency statuses.
#[derive(Clone)]
pub struct ConsistencyService {
    statuses: Arc<dyn ConsistencyStatusRepository>,
}

impl ConsistencyService {
    #[must_use]
    pub fn new(statuses: Arc<dyn ConsistencyStatusRepository>) -> Self {
        Self { statuses }
    }

    /// The status recorded for `qid`, if any.
    ///
    /// An unreadable stored value is logged and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::MissingQid` for a blank qid.
    /// Returns `ConsistencyError::Storage` if the backend cannot be reached.
    pub async fn get(&self, qid: &str) -> Result<Option<ConsistencyStatus>, ConsistencyError> {
        let qid = required(qid)?;
        match self.statuses.get(qid).await {
            Ok(status) => Ok(status),
            Err(StorageError::Serialization(err)) => {
                warn!(qid, "unreadable consistency status ignored: {err}");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Store every item of a submission body, one item or an array.
    ///
    /// Returns all parsed items; those without a qid are not stored.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Storage` if a status cannot be stored.
    pub async fn store(&self, body: &Value) -> Result<Vec<ConsistencyStatus>, ConsistencyError> {
        let items = ConsistencyStatus::from_body(body);
        let mut stored = 0_usize;
        for item in items.iter().filter(|item| !item.qid.is_empty()) {
            self.statuses.put(item).await?;
            stored += 1;
        }
        info!(received = items.len(), stored, "consistency statuses stored");
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns `ConsistencyError::MissingQid` for a blank qid.
    /// Returns `ConsistencyError::Storage` if the backend cannot be reached.
    pub async fn delete(&self, qid: &str) -> Result<bool, ConsistencyError> {
        let qid = required(qid)?;
        let deleted = self.statuses.delete(qid).await?;
        info!(qid, deleted, "consistency status deleted");
        Ok(deleted)
    }
}

fn required(qid: &str) -> Result<&str, ConsistencyError> {
    match qid.trim() {
        "" => Err(ConsistencyError::MissingQid),
        qid => Ok(qid),
    }
}
