//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::error::DeltaError;
use storage::repository::StorageError;

/// Errors emitted by `SyncService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncServiceError {
    #[error("sync key is missing")]
    MissingSyncKey,
    #[error("sync key does not belong to the authenticated user")]
    SyncKeyMismatch,
    #[error(transparent)]
    InvalidDelta(#[from] DeltaError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ConsistencyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConsistencyError {
    #[error("qid is missing")]
    MissingQid,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by client-side local storage helpers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocalStoreError {
    #[error("local storage is unavailable: {0}")]
    Unavailable(String),
    #[error("local storage did not keep the value written to {0}")]
    WriteNotPersisted(String),
    #[error("stored progress is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors emitted by `SyncTransport` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("invalid sync endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("sync request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `MergeClient` and `AnswerRecorder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error(transparent)]
    LocalStore(#[from] LocalStoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
