//! Passive storage for encrypted property records.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** Blobs are opaque strings here; this module
//!   must not import anything from `crate::crypto`.
//! - Every query is filtered by the owner column. That filter is
//!   defense-in-depth; isolation is enforced by decryption-time key binding.

pub mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or initialised.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A statement failed.
    #[error("storage query failed: {source}")]
    Query {
        #[from]
        source: rusqlite::Error,
    },

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

/// One stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Storage-assigned id.
    pub id: i64,
    /// Encrypted blob in the cipher's storage form.
    pub blob: String,
}

/// Narrow contract with the record store.
///
/// `owner` is an opaque fingerprint; the store never sees an identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a blob and return its new id.
    async fn insert(&self, owner: &str, blob: &str) -> Result<i64, StoreError>;

    /// Fetch one record if it exists and belongs to `owner`.
    async fn get(&self, id: i64, owner: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// All records belonging to `owner`, ordered by id.
    async fn list(&self, owner: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Replace a blob. `false` if no such record belongs to `owner`.
    async fn update(&self, id: i64, owner: &str, blob: &str) -> Result<bool, StoreError>;

    /// Remove a record. `false` if no such record belongs to `owner`.
    async fn delete(&self, id: i64, owner: &str) -> Result<bool, StoreError>;

    /// Cheap readiness probe used by `/health`.
    async fn ping(&self) -> bool;
}
