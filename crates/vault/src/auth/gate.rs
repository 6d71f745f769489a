//! The authentication gate: bearer header in, [`AuthOutcome`] out.

use std::sync::Arc;

use tracing::{debug, error};

use super::verifier::{Claims, TokenVerifier};

/// Why a request was turned away, with the status the boundary should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Caller-visible reason. Never names the failing verification step.
    pub reason: &'static str,
    /// HTTP status hint.
    pub status: u16,
}

impl Rejection {
    /// No `Authorization` header, or not of the form `Bearer <token>`.
    pub const MISSING_CREDENTIAL: Rejection = Rejection {
        reason: "missing or malformed credential",
        status: 401,
    };

    /// The provider refused the token, for whatever reason.
    pub const INVALID_TOKEN: Rejection = Rejection {
        reason: "invalid or expired token",
        status: 401,
    };
}

/// Terminal result of running the gate for one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The credential is valid; handlers may proceed with this caller.
    Verified(VerifiedCaller),
    /// The credential was absent or refused.
    Rejected(Rejection),
    /// Something other than the credential went wrong. Reported as a bare 500.
    InternalFailure,
}

/// The identity a request is acting as, as asserted by the provider.
///
/// Only the gate constructs this, so a handler holding one has passed
/// verification. Immutable for the life of the request.
#[derive(Clone)]
pub struct VerifiedCaller {
    subject_id: String,
    email: Option<String>,
    email_verified: bool,
    claims: Claims,
}

impl VerifiedCaller {
    /// Build a caller from provider claims. `None` without a non-empty `sub`.
    pub(crate) fn from_claims(claims: Claims) -> Option<Self> {
        let subject_id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())?
            .to_owned();
        let email = claims
            .get("email")
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let email_verified = claims
            .get("email_verified")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Some(Self {
            subject_id,
            email,
            email_verified,
            claims,
        })
    }

    /// Provider-issued subject. This is the identity records are keyed on.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn email_verified(&self) -> bool {
        self.email_verified
    }

    /// Everything the provider returned, unparsed.
    #[allow(dead_code)]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

impl std::fmt::Debug for VerifiedCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Subject and email are identity data; keep them out of logs.
        f.debug_struct("VerifiedCaller")
            .field("subject_id", &"[REDACTED]")
            .field("email_verified", &self.email_verified)
            .finish_non_exhaustive()
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively; the token must be non-empty and
/// contain no whitespace.
fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Runs every inbound credential past the identity provider.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Check the raw `Authorization` header value of one request.
    ///
    /// Revocation checking is always requested. This call performs provider
    /// I/O and has no timeout of its own.
    pub async fn check(&self, authorization: Option<&str>) -> AuthOutcome {
        let Some(token) = bearer_token(authorization) else {
            debug!("credential missing or malformed");
            return AuthOutcome::Rejected(Rejection::MISSING_CREDENTIAL);
        };

        match self.verifier.verify_token(token, true).await {
            Ok(claims) => match VerifiedCaller::from_claims(claims) {
                Some(caller) => AuthOutcome::Verified(caller),
                None => {
                    debug!("verified token carries no subject");
                    AuthOutcome::Rejected(Rejection::INVALID_TOKEN)
                }
            },
            Err(e) if e.is_credential_failure() => {
                debug!(reason = %e, "credential rejected");
                AuthOutcome::Rejected(Rejection::INVALID_TOKEN)
            }
            Err(e) => {
                error!(error = %e, "token verification failed");
                AuthOutcome::InternalFailure
            }
        }
    }
}
