use std::sync::Arc;

use quiz_core::model::Qid;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::LocalStoreError;
use crate::local_store::LocalStore;

/// One-shot handoff from a question's A part to its B part.
///
/// The A part leaves a token; the B part counts the answer only if it can
/// take that token. Reloading B or opening it directly finds no token.
#[derive(Clone)]
pub struct TokenRelay {
    store: Arc<dyn LocalStore>,
}

impl TokenRelay {
    pub const KEY_PREFIX: &'static str = "from_a_token:";

    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn key_for(qid: &Qid) -> String {
        format!("{}{qid}", Self::KEY_PREFIX)
    }

    /// Leave a fresh token for `qid`, replacing any unconsumed one.
    ///
    /// The write is read back; a store that silently drops writes would
    /// otherwise make every B part look like a reload.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::WriteNotPersisted` if the token does not read back.
    pub fn issue(&self, qid: &Qid) -> Result<String, LocalStoreError> {
        let key = Self::key_for(qid);
        let token = format!("{:032x}", rand::rng().random::<u128>());
        self.store.set(&key, &token)?;
        match self.store.get(&key)? {
            Some(stored) if stored == token => {
                debug!(%qid, "relay token issued");
                Ok(token)
            }
            _ => {
                warn!(%qid, "relay token did not persist");
                Err(LocalStoreError::WriteNotPersisted(key))
            }
        }
    }

    /// Whether a token for `qid` is waiting, without taking it.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the store cannot be read.
    pub fn peek(&self, qid: &Qid) -> Result<bool, LocalStoreError> {
        Ok(self.store.get(&Self::key_for(qid))?.is_some())
    }

    /// Take the token for `qid`. At most one caller ever receives a given token.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the store cannot be accessed.
    pub fn consume(&self, qid: &Qid) -> Result<Option<String>, LocalStoreError> {
        self.store.remove(&Self::key_for(qid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::MemoryLocalStore;

    struct DroppingStore;

    impl LocalStore for DroppingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, LocalStoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), LocalStoreError> {
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<Option<String>, LocalStoreError> {
            Ok(None)
        }
    }

    fn qid() -> Qid {
        "20250926-004".parse().unwrap()
    }

    #[test]
    fn token_is_consumed_once() {
        let relay = TokenRelay::new(Arc::new(MemoryLocalStore::new()));
        let token = relay.issue(&qid()).unwrap();
        assert_eq!(token.len(), 32);
        assert!(relay.peek(&qid()).unwrap());
        assert_eq!(relay.consume(&qid()).unwrap(), Some(token));
        assert_eq!(relay.consume(&qid()).unwrap(), None);
        assert!(!relay.peek(&qid()).unwrap());
    }

    #[test]
    fn reissue_replaces_token() {
        let relay = TokenRelay::new(Arc::new(MemoryLocalStore::new()));
        let first = relay.issue(&qid()).unwrap();
        let second = relay.issue(&qid()).unwrap();
        assert_ne!(first, second);
        assert_eq!(relay.consume(&qid()).unwrap(), Some(second));
    }

    #[test]
    fn unpersisted_write_is_an_error() {
        let relay = TokenRelay::new(Arc::new(DroppingStore));
        assert!(matches!(
            relay.issue(&qid()),
            Err(LocalStoreError::WriteNotPersisted(key)) if key == "from_a_token:20250926-004"
        ));
    }
}
