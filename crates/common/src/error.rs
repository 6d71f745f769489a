//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::Unauthorized`] → 401
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::IntegrityFailure`] → 500
/// - [`ServiceError::EncryptionFailure`] → 500
/// - [`ServiceError::Unavailable`] → 503
/// - [`ServiceError::Internal`] → 500
///
/// Only the 4xx variants carry a caller-visible message. Everything else is
/// reported with a fixed generic message; the inner detail is for server logs.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed — bad JSON shape or an invalid path parameter.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The bearer credential was missing, malformed, or rejected by the
    /// identity provider.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested record does not exist for this caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored record failed authentication or could not be parsed.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// Encryption failed due to a crypto-layer error.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// A required collaborator (storage, configuration) is unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The error kind that reports `status` to the caller with `message`.
    ///
    /// Statuses with no dedicated kind fall back to [`ServiceError::Internal`].
    pub fn for_status(status: u16, message: String) -> Self {
        match status {
            400 => ServiceError::BadRequest(message),
            401 => ServiceError::Unauthorized(message),
            404 => ServiceError::NotFound(message),
            503 => ServiceError::Unavailable(message),
            _ => ServiceError::Internal(message),
        }
    }

    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::NotFound(_) => 404,
            ServiceError::IntegrityFailure(_) => 500,
            ServiceError::EncryptionFailure(_) => 500,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code placed in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::IntegrityFailure(_) => "integrity_failure",
            ServiceError::EncryptionFailure(_) => "encryption_failure",
            ServiceError::Unavailable(_) => "service_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Message that is safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::BadRequest(m)
            | ServiceError::Unauthorized(m)
            | ServiceError::NotFound(m) => m.clone(),
            ServiceError::IntegrityFailure(_) => "stored record failed verification".into(),
            ServiceError::EncryptionFailure(_) => "encryption failed".into(),
            ServiceError::Unavailable(_) => "service temporarily unavailable".into(),
            ServiceError::Internal(_) => "internal server error".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ServiceError::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(ServiceError::NotFound("x".into()).http_status(), 404);
        assert_eq!(ServiceError::IntegrityFailure("x".into()).http_status(), 500);
        assert_eq!(
            ServiceError::EncryptionFailure("x".into()).http_status(),
            500
        );
        assert_eq!(ServiceError::Unavailable("x".into()).http_status(), 503);
        assert_eq!(ServiceError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn for_status_round_trips_known_codes() {
        for status in [400, 401, 404, 503] {
            assert_eq!(ServiceError::for_status(status, "m".into()).http_status(), status);
        }
        let e = ServiceError::for_status(401, "invalid or expired token".into());
        assert_eq!(e.public_message(), "invalid or expired token");
        assert_eq!(ServiceError::for_status(418, "m".into()).http_status(), 500);
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::BadRequest("details must be an object".into());
        assert!(e.to_string().contains("details must be an object"));
    }

    #[test]
    fn server_side_detail_is_not_public() {
        let e = ServiceError::Internal("sqlite: disk I/O error".into());
        assert_eq!(e.public_message(), "internal server error");

        let e = ServiceError::IntegrityFailure("aead tag mismatch".into());
        assert!(!e.public_message().contains("tag"));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let e = ServiceError::Unauthorized("invalid or expired token".into());
        assert_eq!(e.public_message(), "invalid or expired token");
        assert_eq!(e.code(), "unauthorized");
    }
}
