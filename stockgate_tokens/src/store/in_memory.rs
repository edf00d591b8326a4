//! A volatile credential store

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{LoadError, PersistError, TokenStore};
use crate::StoredCredential;

/// A token store that forgets everything when dropped
///
/// Useful when persistence across restarts is not wanted, and in tests.
#[derive(Default, Debug)]
pub struct InMemoryTokenStore {
    record: Mutex<Option<StoredCredential>>,
}

impl InMemoryTokenStore {
    /// Constructs an empty store
    pub const fn new() -> Self {
        Self {
            record: Mutex::new(None),
        }
    }

    /// Constructs a store already holding `record`
    pub fn with_record(record: StoredCredential) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    /// Gets a copy of the stored record, if any
    pub fn snapshot(&self) -> Option<StoredCredential> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> Result<StoredCredential, LoadError> {
        self.snapshot().ok_or(LoadError::NotFound)
    }

    async fn save(&self, record: &StoredCredential) -> Result<(), PersistError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }
}
