//! Property records: encrypt-then-store and load-then-decrypt, always on
//! behalf of a [`VerifiedCaller`].
//!
//! Every operation takes the caller the gate produced. The caller's subject
//! is the only identity ever handed to the cipher, and its keyed fingerprint
//! is the only owner value ever handed to the store.

use std::sync::Arc;

use common::protocol::PropertyRecord;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::VerifiedCaller;
use crate::crypto::{CipherError, FieldCipher, KdfError};
use crate::storage::{RecordStore, StoreError};

/// Errors produced by record operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// No record with this id belongs to the caller.
    #[error("property {0} not found")]
    NotFound(i64),

    /// Property details were not a JSON object.
    #[error("property details must be a JSON object")]
    InvalidDetails,

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Key(#[from] KdfError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Encrypted property records for verified callers.
#[derive(Clone)]
pub struct Records {
    cipher: FieldCipher,
    store: Arc<dyn RecordStore>,
}

impl Records {
    pub fn new(cipher: FieldCipher, store: Arc<dyn RecordStore>) -> Self {
        Self { cipher, store }
    }

    /// Whether the store currently answers.
    pub async fn storage_ready(&self) -> bool {
        self.store.ping().await
    }

    /// Encrypt `details` under the caller's key and store it.
    pub async fn create(
        &self,
        caller: &VerifiedCaller,
        details: Value,
    ) -> Result<PropertyRecord, RecordError> {
        ensure_object(&details)?;
        let owner = self.owner(caller)?;
        let blob = self.cipher.seal(&details, caller.subject_id())?;
        let id = self.store.insert(&owner, &blob).await?;
        debug!(owner = %owner, id, "property created");
        Ok(PropertyRecord { id, details })
    }

    /// Every record the caller owns, decrypted.
    ///
    /// One record that fails to decrypt fails the whole listing.
    pub async fn list(&self, caller: &VerifiedCaller) -> Result<Vec<PropertyRecord>, RecordError> {
        let owner = self.owner(caller)?;
        self.store
            .list(&owner)
            .await?
            .into_iter()
            .map(|row| self.open(caller, &owner, row.id, &row.blob))
            .collect()
    }

    pub async fn get(&self, caller: &VerifiedCaller, id: i64) -> Result<PropertyRecord, RecordError> {
        let owner = self.owner(caller)?;
        let row = self
            .store
            .get(id, &owner)
            .await?
            .ok_or(RecordError::NotFound(id))?;
        self.open(caller, &owner, row.id, &row.blob)
    }

    /// Re-encrypt `details` under a fresh nonce and replace the stored blob.
    pub async fn update(
        &self,
        caller: &VerifiedCaller,
        id: i64,
        details: Value,
    ) -> Result<PropertyRecord, RecordError> {
        ensure_object(&details)?;
        let owner = self.owner(caller)?;
        let blob = self.cipher.seal(&details, caller.subject_id())?;
        if !self.store.update(id, &owner, &blob).await? {
            return Err(RecordError::NotFound(id));
        }
        debug!(owner = %owner, id, "property updated");
        Ok(PropertyRecord { id, details })
    }

    pub async fn delete(&self, caller: &VerifiedCaller, id: i64) -> Result<(), RecordError> {
        let owner = self.owner(caller)?;
        if !self.store.delete(id, &owner).await? {
            return Err(RecordError::NotFound(id));
        }
        debug!(owner = %owner, id, "property deleted");
        Ok(())
    }

    fn owner(&self, caller: &VerifiedCaller) -> Result<String, KdfError> {
        self.cipher.deriver().owner_fingerprint(caller.subject_id())
    }

    fn open(
        &self,
        caller: &VerifiedCaller,
        owner: &str,
        id: i64,
        blob: &str,
    ) -> Result<PropertyRecord, RecordError> {
        match self.cipher.open::<Value>(blob, caller.subject_id()) {
            Ok(details) => Ok(PropertyRecord { id, details }),
            Err(e) => {
                warn!(owner = %owner, id, error = %e, "stored property failed to open");
                Err(e.into())
            }
        }
    }
}

fn ensure_object(details: &Value) -> Result<(), RecordError> {
    if details.is_object() {
        Ok(())
    } else {
        Err(RecordError::InvalidDetails)
    }
}
