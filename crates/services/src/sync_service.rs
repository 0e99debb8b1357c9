use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use quiz_core::model::{ClearedCounts, Qid, ResetScope, SyncDelta, SyncKey, SyncState, UserEmail};
use storage::repository::SyncStateRepository;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::SyncServiceError;
use crate::Clock;

/// A user's record as returned by the state endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub key: SyncKey,
    pub state: SyncState,
    /// False when the user never synced and `state` is the default shape.
    pub found: bool,
}

/// Server side of progress sync: loads, changes and stores one aggregate
/// record per authenticated user.
///
/// The key-value backend has no transactions, so read-modify-write cycles
/// on the same key are serialized by an in-process lock.
#[derive(Clone)]
pub struct SyncService {
    clock: Clock,
    states: Arc<dyn SyncStateRepository>,
    locks: KeyLocks,
}

type LockMap = HashMap<SyncKey, Arc<Mutex<()>>>;

/// One async mutex per key, present only while someone holds or awaits it.
#[derive(Clone, Default)]
struct KeyLocks {
    slots: Arc<StdMutex<LockMap>>,
}

impl KeyLocks {
    async fn lock(&self, key: &SyncKey) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = slot.lock_owned().await;
        KeyGuard {
            key: key.clone(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct KeyGuard {
    key: SyncKey,
    slots: Arc<StdMutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // release first so our own clone of the slot is gone
        drop(self.guard.take());
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // waiters hold clones taken under this same map lock
        if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.key);
        }
    }
}

impl SyncService {
    #[must_use]
    pub fn new(clock: Clock, states: Arc<dyn SyncStateRepository>) -> Self {
        Self {
            clock,
            states,
            locks: KeyLocks::default(),
        }
    }

    /// The partition key of `user`, handed to clients on first contact.
    ///
    /// The key is derived from the email, so a forced reissue returns the
    /// same key; it is only logged.
    #[must_use]
    pub fn init(&self, user: &UserEmail, force: bool) -> SyncKey {
        let key = SyncKey::for_user(user);
        info!(%key, force, "sync key issued");
        key
    }

    /// Read the record of `user`.
    ///
    /// The caller must present the key it was given by [`SyncService::init`].
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::MissingSyncKey` or `SyncKeyMismatch` when the
    /// presented key is absent or names another user.
    /// Returns `SyncServiceError::Storage` if the record cannot be read.
    pub async fn state(
        &self,
        user: &UserEmail,
        presented_key: Option<&str>,
    ) -> Result<StateSnapshot, SyncServiceError> {
        let key = SyncKey::for_user(user);
        let presented = presented_key
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(SyncServiceError::MissingSyncKey)?;
        if !key.matches(presented) {
            warn!(%key, "sync key mismatch on state read");
            return Err(SyncServiceError::SyncKeyMismatch);
        }

        let stored = self.states.load(&key).await?;
        let found = stored.is_some();
        debug!(%key, found, "state read");
        Ok(StateSnapshot {
            key,
            state: stored.unwrap_or_default(),
            found,
        })
    }

    /// Fold `delta` into the record of `user` and return the merged record.
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::InvalidDelta` if the delta is inconsistent;
    /// nothing is written in that case.
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn merge(
        &self,
        user: &UserEmail,
        delta: &SyncDelta,
    ) -> Result<SyncState, SyncServiceError> {
        let (state, summary) = self
            .update(user, |state, now| state.merge(delta, now).map_err(Into::into))
            .await?;
        info!(
            user = %user,
            added = summary.added,
            touched = summary.touched,
            once_per_day_rolled = summary.once_per_day_rolled,
            "delta merged"
        );
        Ok(state)
    }

    /// Clear the portion of the record named by `scope`.
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn reset(
        &self,
        user: &UserEmail,
        scope: ResetScope,
    ) -> Result<SyncState, SyncServiceError> {
        let (state, ()) = self
            .update(user, |state, now| {
                state.reset(scope, now);
                Ok(())
            })
            .await?;
        info!(user = %user, ?scope, "progress reset");
        Ok(state)
    }

    /// Remove every counter kept for `qid`.
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn reset_qid(
        &self,
        user: &UserEmail,
        qid: &Qid,
    ) -> Result<SyncState, SyncServiceError> {
        let (state, ()) = self
            .update(user, |state, now| {
                state.clear_qid(qid, now);
                Ok(())
            })
            .await?;
        info!(user = %user, %qid, "question cleared");
        Ok(state)
    }

    /// Empty the per-question totals and streak maps.
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn reset_all_qids(
        &self,
        user: &UserEmail,
    ) -> Result<(ClearedCounts, SyncState), SyncServiceError> {
        let (state, cleared) = self
            .update(user, |state, now| Ok(state.clear_all_qids(now)))
            .await?;
        info!(user = %user, ?cleared, "all questions cleared");
        Ok((cleared, state))
    }

    /// Zero the correct-streak counters of `qid`.
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn reset_streak3_qid(
        &self,
        user: &UserEmail,
        qid: &Qid,
    ) -> Result<SyncState, SyncServiceError> {
        let (state, ()) = self
            .update(user, |state, now| {
                state.clear_streak3_qid(qid, now);
                Ok(())
            })
            .await?;
        info!(user = %user, %qid, "question streak cleared");
        Ok(state)
    }

    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn reset_streak3_today(&self, user: &UserEmail) -> Result<SyncState, SyncServiceError> {
        let (state, previous) = self
            .update(user, |state, now| Ok(state.reset_streak3_today(now)))
            .await?;
        info!(user = %user, had_summary = previous.is_some(), "streak3 today cleared");
        Ok(state)
    }

    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if persistence fails.
    pub async fn reset_once_per_day_today(
        &self,
        user: &UserEmail,
    ) -> Result<SyncState, SyncServiceError> {
        let (state, previous) = self
            .update(user, |state, now| Ok(state.reset_once_per_day_today(now)))
            .await?;
        info!(user = %user, had_block = previous.is_some(), "once-per-day cleared");
        Ok(state)
    }

    /// Delete the whole record of `user`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `SyncServiceError::Storage` if the backend cannot be reached.
    pub async fn completely_delete(&self, user: &UserEmail) -> Result<bool, SyncServiceError> {
        let key = SyncKey::for_user(user);
        let _guard = self.locks.lock(&key).await;
        let deleted = self.states.delete(&key).await?;
        info!(%key, deleted, "record deleted");
        Ok(deleted)
    }

    async fn update<T>(
        &self,
        user: &UserEmail,
        change: impl FnOnce(&mut SyncState, DateTime<Utc>) -> Result<T, SyncServiceError>,
    ) -> Result<(SyncState, T), SyncServiceError> {
        let key = SyncKey::for_user(user);
        let _guard = self.locks.lock(&key).await;
        let mut state = self.states.load(&key).await?.unwrap_or_default();
        let out = change(&mut state, self.clock.now())?;
        self.states.save(&key, &state).await?;
        Ok((state, out))
    }
}
