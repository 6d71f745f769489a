//! Shared application state injected into every Axum handler.

use crate::auth::AuthGate;
use crate::records::Records;

/// Application state shared across all request handlers.
///
/// Both fields are `Arc`-backed, so Axum's per-request clone is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The mandatory credential check run by the [`crate::auth::VerifiedCaller`] extractor.
    pub auth_gate: AuthGate,
    /// Encrypted property records.
    pub records: Records,
}

impl AppState {
    pub fn new(auth_gate: AuthGate, records: Records) -> Self {
        Self { auth_gate, records }
    }
}
