use std::sync::Arc;

use quiz_core::model::{LocalProgress, SyncState};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::local_store::{LocalStore, ProgressStore};
use crate::transport::SyncTransport;

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Nothing pending; no request was made.
    Skipped,
    /// The server accepted the delta and returned the merged record.
    Pushed(SyncState),
}

/// Sends locally recorded progress to the server as deltas.
///
/// The baseline only moves after the server accepts a delta, so a failed
/// push is simply retried with a larger delta next time. The client must be
/// given the same [`ProgressStore`] the device's recorder writes through.
#[derive(Clone)]
pub struct MergeClient {
    store: Arc<dyn LocalStore>,
    progress: ProgressStore,
    transport: Arc<dyn SyncTransport>,
    in_flight: Arc<Mutex<()>>,
}

impl MergeClient {
    pub const SYNC_KEY_KEY: &'static str = "quiz_sync_key";

    #[must_use]
    pub fn new(
        store: Arc<dyn LocalStore>,
        progress: ProgressStore,
        transport: Arc<dyn SyncTransport>,
    ) -> Self {
        Self {
            progress,
            store,
            transport,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// The sync key for this device's user, asking the server once.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the key is neither cached nor obtainable.
    pub async fn sync_key(&self) -> Result<String, ClientError> {
        if let Some(key) = self.store.get(Self::SYNC_KEY_KEY)? {
            return Ok(key);
        }
        let key = self.transport.init().await?;
        self.store.set(Self::SYNC_KEY_KEY, &key)?;
        info!("sync key cached");
        Ok(key)
    }

    /// Push everything the server has not acknowledged yet.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the server rejects the delta or is
    /// unreachable; local progress and baseline are left as they were.
    pub async fn push(&self) -> Result<PushOutcome, ClientError> {
        let _flight = self.in_flight.lock().await;

        // saved even when nothing is sent, to keep a clamped baseline
        let delta = self.progress.update(LocalProgress::prepare_delta)?;
        if delta.is_empty() {
            debug!("nothing to push");
            return Ok(PushOutcome::Skipped);
        }

        let merged = match self.transport.push(&delta).await {
            Ok(merged) => merged,
            Err(err) => {
                warn!("push failed, delta kept pending: {err}");
                return Err(err.into());
            }
        };

        // answers recorded while the request was out stay pending
        self.progress.update(|progress| progress.acknowledge(&delta))?;
        info!(
            correct = delta.correct_delta.len(),
            incorrect = delta.incorrect_delta.len(),
            "delta pushed"
        );
        Ok(PushOutcome::Pushed(merged))
    }

    /// Adopt the server record, keeping local answers that are still pending.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the record cannot be fetched or progress cannot be saved.
    pub async fn pull(&self) -> Result<SyncState, ClientError> {
        let _flight = self.in_flight.lock().await;
        let key = self.sync_key().await?;
        let server = self.transport.pull(&key).await?;
        self.progress.update(|progress| progress.adopt_server(&server))?;
        debug!("server record adopted");
        Ok(server)
    }
}
