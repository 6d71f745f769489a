//! Per-identity key derivation from the process-wide master secret.
//!
//! `key = HKDF-SHA256(salt = identity, ikm = master_secret, info = KEY_CONTEXT)`

use std::sync::Arc;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Byte length of a derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// Minimum decoded length of the master secret (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

/// HKDF `info` for record encryption keys.
pub const KEY_CONTEXT: &[u8] = b"propvault:record-key:v1";

/// HMAC domain label for owner fingerprints stored next to each record.
pub const OWNER_CONTEXT: &[u8] = b"propvault:owner-fingerprint:v1";

/// Errors produced by the key-derivation layer.
#[derive(Debug, Error)]
pub enum KdfError {
    /// No master secret was supplied.
    #[error("master secret is not configured")]
    MissingSecret,

    /// The master secret is not valid standard base64.
    #[error("master secret is not valid base64")]
    MalformedSecret,

    /// The decoded master secret is shorter than [`MIN_SECRET_LEN`].
    #[error("master secret too short: expected at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),

    /// An empty identity cannot key a record.
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// HKDF or HMAC rejected its inputs.
    #[error("key expansion failed")]
    Expand,
}

impl KdfError {
    /// `true` for failures caused by the master secret rather than by the call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KdfError::MissingSecret | KdfError::MalformedSecret | KdfError::SecretTooShort(_)
        )
    }
}

/// Decoded master secret bytes. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Decode the master secret from its stored base64 form.
    ///
    /// # Errors
    ///
    /// [`KdfError::MissingSecret`] for an empty value, [`KdfError::MalformedSecret`]
    /// for invalid base64, [`KdfError::SecretTooShort`] below 256 bits.
    pub fn from_base64(encoded: &str) -> Result<Self, KdfError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(KdfError::MissingSecret);
        }
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|_| KdfError::MalformedSecret)?,
        );
        if decoded.len() < MIN_SECRET_LEN {
            return Err(KdfError::SecretTooShort(decoded.len()));
        }
        Ok(Self(decoded.to_vec()))
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret([REDACTED])")
    }
}

/// A 256-bit key bound to one identity. Recomputed per call; zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Raw key bytes, for handing to the AEAD.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derives identity-bound keys from a shared, read-only [`MasterSecret`].
///
/// Cloning is cheap; all clones share the same secret.
#[derive(Clone, Debug)]
pub struct KeyDeriver {
    secret: Arc<MasterSecret>,
}

impl KeyDeriver {
    /// Wrap an already-decoded master secret.
    pub fn new(secret: MasterSecret) -> Self {
        Self {
            secret: Arc::new(secret),
        }
    }

    /// Decode `encoded` with [`MasterSecret::from_base64`] and wrap it.
    ///
    /// # Errors
    ///
    /// Propagates any decoding error from [`MasterSecret::from_base64`].
    pub fn from_base64(encoded: &str) -> Result<Self, KdfError> {
        MasterSecret::from_base64(encoded).map(Self::new)
    }

    /// Derive the record key for `identity`.
    ///
    /// Deterministic: the same identity always yields the same key under the
    /// same master secret.
    ///
    /// # Errors
    ///
    /// [`KdfError::EmptyIdentity`] if `identity` is empty.
    pub fn derive_key(&self, identity: &str) -> Result<DerivedKey, KdfError> {
        if identity.is_empty() {
            return Err(KdfError::EmptyIdentity);
        }
        let hk = Hkdf::<Sha256>::new(Some(identity.as_bytes()), &self.secret.0);
        let mut okm = [0u8; KEY_LEN];
        hk.expand(KEY_CONTEXT, &mut okm)
            .map_err(|_| KdfError::Expand)?;
        let key = DerivedKey(okm);
        okm.zeroize();
        Ok(key)
    }

    /// Keyed fingerprint of `identity`, used as the storage owner column and
    /// as a log correlation id. Reveals nothing about the identity without the
    /// master secret.
    ///
    /// # Errors
    ///
    /// [`KdfError::EmptyIdentity`] if `identity` is empty.
    pub fn owner_fingerprint(&self, identity: &str) -> Result<String, KdfError> {
        if identity.is_empty() {
            return Err(KdfError::EmptyIdentity);
        }
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret.0).map_err(|_| KdfError::Expand)?;
        mac.update(OWNER_CONTEXT);
        mac.update(&[0]);
        mac.update(identity.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver() -> KeyDeriver {
        KeyDeriver::from_base64(&STANDARD.encode([0x42u8; 32])).unwrap()
    }

    #[test]
    fn deterministic_per_identity() {
        let d = deriver();
        let a = d.derive_key("user-42").unwrap();
        let b = d.derive_key("user-42").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn distinct_identities_get_distinct_keys() {
        let d = deriver();
        let ids = ["user-1", "user-2", "user-10", "User-1", "user-1 "];
        let keys: Vec<_> = ids.iter().map(|i| *d.derive_key(i).unwrap().as_bytes()).collect();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j], "{} vs {}", ids[i], ids[j]);
            }
        }
    }

    #[test]
    fn different_master_secret_changes_key() {
        let a = deriver().derive_key("user-42").unwrap();
        let other = KeyDeriver::from_base64(&STANDARD.encode([0x43u8; 32])).unwrap();
        let b = other.derive_key("user-42").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn matches_direct_hkdf_construction() {
        let secret = [0x07u8; 40];
        let d = KeyDeriver::from_base64(&STANDARD.encode(secret)).unwrap();

        let hk = Hkdf::<Sha256>::new(Some(b"user-42"), &secret);
        let mut expected = [0u8; KEY_LEN];
        hk.expand(KEY_CONTEXT, &mut expected).unwrap();

        assert_eq!(d.derive_key("user-42").unwrap().as_bytes(), &expected);
    }

    #[test]
    fn empty_secret_is_missing() {
        assert!(matches!(
            MasterSecret::from_base64("  "),
            Err(KdfError::MissingSecret)
        ));
    }

    #[test]
    fn bad_base64_is_malformed() {
        let err = MasterSecret::from_base64("not base64 !!").unwrap_err();
        assert!(matches!(err, KdfError::MalformedSecret));
        assert!(err.is_configuration());
    }

    #[test]
    fn short_secret_rejected() {
        let err = MasterSecret::from_base64(&STANDARD.encode([1u8; 16])).unwrap_err();
        assert!(matches!(err, KdfError::SecretTooShort(16)));
    }

    #[test]
    fn longer_secret_accepted() {
        assert!(MasterSecret::from_base64(&STANDARD.encode([1u8; 64])).is_ok());
    }

    #[test]
    fn empty_identity_rejected() {
        let err = deriver().derive_key("").unwrap_err();
        assert!(matches!(err, KdfError::EmptyIdentity));
        assert!(!err.is_configuration());
    }

    #[test]
    fn owner_fingerprint_is_stable_and_opaque() {
        let d = deriver();
        let a = d.owner_fingerprint("user-42").unwrap();
        assert_eq!(a, d.owner_fingerprint("user-42").unwrap());
        assert_ne!(a, d.owner_fingerprint("user-43").unwrap());
        assert!(!a.contains("user-42"));
    }

    #[test]
    fn secrets_redacted_in_debug() {
        let d = deriver();
        assert!(format!("{d:?}").contains("REDACTED"));
        let k = d.derive_key("user-42").unwrap();
        assert_eq!(format!("{k:?}"), "DerivedKey([REDACTED])");
    }
}
