#![forbid(unsafe_code)]

pub mod consistency_service;
pub mod error;
pub mod local_store;
pub mod merge_client;
pub mod recorder;
pub mod sync_service;
pub mod token_relay;
pub mod transport;

pub use quiz_core::Clock;

pub use consistency_service::ConsistencyService;
pub use error::{
    ClientError, ConsistencyError, LocalStoreError, SyncServiceError, TransportError,
};
pub use local_store::{LocalStore, MemoryLocalStore, ProgressStore};
pub use merge_client::{MergeClient, PushOutcome};
pub use recorder::{AnswerRecorder, NotCountedReason, PartBResult};
pub use sync_service::{StateSnapshot, SyncService};
pub use token_relay::TokenRelay;
pub use transport::{
    ACCESS_EMAIL_HEADER, HttpSyncConfig, HttpSyncTransport, SYNC_KEY_HEADER, SYNC_USER_HEADER,
    SyncTransport,
};
