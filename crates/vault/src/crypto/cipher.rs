//! AES-256-GCM encryption of whole JSON records under identity-bound keys.
//!
//! Every call draws a fresh 128-bit nonce from the OS CSPRNG. The key is
//! re-derived from the caller's identity on every call and dropped (zeroed)
//! before returning, so nothing key-shaped outlives the operation.

use aes_gcm::{
    aead::{consts::U16, rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    aes::Aes256,
    AesGcm, Nonce, Tag,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use super::kdf::{KdfError, KeyDeriver};

/// Byte length of a record nonce (16 bytes = 128 bits).
pub const NONCE_LEN: usize = 16;

/// Byte length of the GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Prefix that appears at the start of every stored blob. Also bound into the
/// AEAD as associated data.
pub const VERSION_PREFIX: &str = "v1";

/// AES-256-GCM with a 128-bit nonce.
type RecordAead = AesGcm<Aes256, U16>;

/// Errors produced by the cipher layer.
///
/// Messages are fixed strings: no variant ever carries plaintext, key bytes,
/// or serde detail (which can quote input).
#[derive(Debug, Error)]
pub enum CipherError {
    /// The identity key could not be derived.
    #[error("key derivation failed: {0}")]
    Key(#[from] KdfError),

    /// Serialisation or the AEAD primitive failed while encrypting.
    #[error("encryption failed")]
    Encryption,

    /// Tag verification failed: tampered record, wrong identity, or corruption.
    #[error("record failed authentication")]
    Integrity,

    /// The record authenticated but its plaintext is not the expected shape.
    #[error("decrypted record could not be decoded")]
    Decoding,

    /// A stored blob does not match `v1.<nonce>.<ciphertext>.<tag>`.
    #[error("stored record is malformed")]
    Encoding,
}

/// An encrypted record as produced by [`FieldCipher::encrypt`].
///
/// The storage form is
/// `v1.<base64url(nonce)>.<base64url(ciphertext)>.<base64url(tag)>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    /// AES-GCM ciphertext, same length as the serialised plaintext.
    pub ciphertext: Vec<u8>,
    /// Nonce used for exactly this one encryption.
    pub nonce: [u8; NONCE_LEN],
    /// Detached authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl EncryptedRecord {
    /// Pack the record into a single opaque string for storage.
    pub fn encode_for_storage(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
            URL_SAFE_NO_PAD.encode(self.tag),
        )
    }

    /// Parse a stored blob back into an [`EncryptedRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encoding`] if the blob does not have exactly four
    /// dot-separated parts, has an unknown version, contains invalid base64,
    /// or has a nonce or tag of the wrong length.
    pub fn decode_from_storage(blob: &str) -> Result<Self, CipherError> {
        let parts: Vec<&str> = blob.split('.').collect();
        if parts.len() != 4 || parts[0] != VERSION_PREFIX {
            return Err(CipherError::Encoding);
        }
        let nonce = decode_fixed::<NONCE_LEN>(parts[1])?;
        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CipherError::Encoding)?;
        let tag = decode_fixed::<TAG_LEN>(parts[3])?;
        Ok(Self {
            ciphertext,
            nonce,
            tag,
        })
    }
}

fn decode_fixed<const N: usize>(part: &str) -> Result<[u8; N], CipherError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| CipherError::Encoding)?;
    bytes.try_into().map_err(|_| CipherError::Encoding)
}

/// Randomised authenticated encryption keyed on a verified identity.
#[derive(Clone, Debug)]
pub struct FieldCipher {
    deriver: KeyDeriver,
}

impl FieldCipher {
    /// Create a cipher that derives its keys through `deriver`.
    pub fn new(deriver: KeyDeriver) -> Self {
        Self { deriver }
    }

    /// The key deriver backing this cipher.
    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Serialise `plaintext` as JSON and encrypt it under `identity`'s key.
    ///
    /// # Errors
    ///
    /// [`CipherError::Key`] if no key can be derived for `identity`;
    /// [`CipherError::Encryption`] if serialisation or the AEAD fails.
    pub fn encrypt<T>(&self, plaintext: &T, identity: &str) -> Result<EncryptedRecord, CipherError>
    where
        T: Serialize + ?Sized,
    {
        let mut buffer =
            Zeroizing::new(serde_json::to_vec(plaintext).map_err(|_| CipherError::Encryption)?);
        let aead = self.aead_for(identity)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let tag = aead
            .encrypt_in_place_detached(
                Nonce::<U16>::from_slice(&nonce),
                VERSION_PREFIX.as_bytes(),
                buffer.as_mut_slice(),
            )
            .map_err(|_| CipherError::Encryption)?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(&tag);

        Ok(EncryptedRecord {
            ciphertext: std::mem::take(&mut *buffer),
            nonce,
            tag: tag_bytes,
        })
    }

    /// Authenticate and decrypt `record` under `identity`'s key, then
    /// deserialise the JSON plaintext.
    ///
    /// No plaintext byte is observable unless the tag verifies.
    ///
    /// # Errors
    ///
    /// [`CipherError::Integrity`] if the tag does not verify;
    /// [`CipherError::Decoding`] if the authenticated plaintext is not a `T`.
    pub fn decrypt<T>(&self, record: &EncryptedRecord, identity: &str) -> Result<T, CipherError>
    where
        T: DeserializeOwned,
    {
        let aead = self.aead_for(identity)?;
        let mut buffer = Zeroizing::new(record.ciphertext.clone());
        aead.decrypt_in_place_detached(
            Nonce::<U16>::from_slice(&record.nonce),
            VERSION_PREFIX.as_bytes(),
            buffer.as_mut_slice(),
            Tag::<U16>::from_slice(&record.tag),
        )
        .map_err(|_| CipherError::Integrity)?;

        serde_json::from_slice(&buffer).map_err(|_| CipherError::Decoding)
    }

    /// [`Self::encrypt`] followed by [`EncryptedRecord::encode_for_storage`].
    pub fn seal<T>(&self, plaintext: &T, identity: &str) -> Result<String, CipherError>
    where
        T: Serialize + ?Sized,
    {
        self.encrypt(plaintext, identity)
            .map(|record| record.encode_for_storage())
    }

    /// [`EncryptedRecord::decode_from_storage`] followed by [`Self::decrypt`].
    pub fn open<T>(&self, blob: &str, identity: &str) -> Result<T, CipherError>
    where
        T: DeserializeOwned,
    {
        let record = EncryptedRecord::decode_from_storage(blob)?;
        self.decrypt(&record, identity)
    }

    fn aead_for(&self, identity: &str) -> Result<RecordAead, CipherError> {
        let key = self.deriver.derive_key(identity)?;
        RecordAead::new_from_slice(key.as_bytes()).map_err(|_| CipherError::Encryption)
    }
}
