//! Contract with the external identity-provider verification service.

use async_trait::async_trait;
use thiserror::Error;

/// Decoded provider claims, as returned by the provider.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Errors from token verification.
///
/// Every variant except [`VerifyError::Unavailable`] means "this credential is
/// not acceptable" and is reported to the caller as a plain 401. None of them
/// carry the token.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The provider does not consider the token active: unknown, malformed,
    /// or belonging to a session it has revoked. RFC 7662 does not tell these
    /// apart.
    #[error("token is not active")]
    Inactive,

    /// The token is past its expiry or before its not-before time.
    #[error("token is outside its validity window")]
    Expired,

    /// The provider could not be reached or answered unexpectedly.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl VerifyError {
    /// `true` if the failure is a property of the credential rather than of
    /// the provider or transport.
    pub fn is_credential_failure(&self) -> bool {
        !matches!(self, VerifyError::Unavailable(_))
    }
}

/// Verifies bearer tokens with the identity provider.
///
/// Implementations must be safe to share across concurrent requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return its claims.
    ///
    /// With `check_revoked` set, tokens whose session the provider has since
    /// invalidated must be rejected even if their signature is still valid.
    async fn verify_token(&self, token: &str, check_revoked: bool) -> Result<Claims, VerifyError>;
}
