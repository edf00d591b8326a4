//! Durable storage for the current credential

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::StoredCredential;

pub mod file;
pub mod in_memory;

pub use file::FileTokenStore;
pub use in_memory::InMemoryTokenStore;

/// A place to keep the current credential between refreshes
///
/// Implementations hold exactly one record. Callers are expected to serialize
/// writes themselves; the [`TokenSupplier`][crate::TokenSupplier] does so
/// with its refresh guard.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Reads the stored record
    async fn load(&self) -> Result<StoredCredential, LoadError>;

    /// Replaces the stored record
    ///
    /// A reader must never be able to observe a partially written record.
    async fn save(&self, record: &StoredCredential) -> Result<(), PersistError>;
}

/// The stored record could not be read
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing has been stored yet
    #[error("no credential has been stored")]
    NotFound,
    /// The backing storage exists but could not be read
    #[error("credential store could not be read")]
    Unreadable(#[source] io::Error),
    /// The backing storage was read but does not hold a valid record
    #[error("credential store holds an undecodable record")]
    Corrupt(#[source] serde_json::Error),
}

/// The record could not be written
#[derive(Debug, Error)]
pub enum PersistError {
    /// The record could not be serialized
    #[error("unable to encode credential record")]
    Encode(#[source] serde_json::Error),
    /// The record could not be written to the backing storage
    #[error("unable to write credential record")]
    Io(#[source] io::Error),
}
