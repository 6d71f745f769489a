//! Identity-bound record encryption.
//!
//! This module is intentionally free of HTTP and storage dependencies.
//! [`KeyDeriver`] turns a verified identity into a record key;
//! [`FieldCipher`] uses that key for AES-256-GCM.
//!
//! # Stored format
//!
//! ```text
//! v1.<base64url(nonce)>.<base64url(ciphertext)>.<base64url(tag)>
//! ```
//!
//! The `v1` prefix enables future algorithm migration without breaking
//! existing blobs.

pub mod cipher;
pub mod kdf;

pub use cipher::{CipherError, FieldCipher};
pub use kdf::{KdfError, KeyDeriver};
