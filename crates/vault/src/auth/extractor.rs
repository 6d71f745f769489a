//! Axum extractor that runs the [`AuthGate`](super::AuthGate) for a handler.
//!
//! Any handler that takes a [`VerifiedCaller`] argument cannot run unless the
//! gate returned `Verified`. Declare it before body extractors so the
//! credential is checked before the body is read.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use common::ServiceError;

use super::gate::{AuthOutcome, Rejection, VerifiedCaller};
use crate::server::{error::ApiError, state::AppState};

#[async_trait]
impl FromRequestParts<AppState> for VerifiedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A non-visible-ASCII header is treated the same as a missing one.
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        match state.auth_gate.check(header).await {
            AuthOutcome::Verified(caller) => Ok(caller),
            AuthOutcome::Rejected(rejection) => Err(rejected(rejection)),
            AuthOutcome::InternalFailure => {
                Err(ServiceError::Internal("authentication failed unexpectedly".into()).into())
            }
        }
    }
}

/// Report a gate rejection with the status it asks for.
fn rejected(rejection: Rejection) -> ApiError {
    ServiceError::for_status(rejection.status, rejection.reason.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::testing;
    use axum::http::Request;

    async fn extract(authorization: Option<&str>) -> Result<VerifiedCaller, ApiError> {
        let mut builder = Request::builder().uri("/me");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        VerifiedCaller::from_request_parts(&mut parts, &testing::state()).await
    }

    #[test]
    fn rejection_keeps_status_and_reason() {
        for r in [Rejection::MISSING_CREDENTIAL, Rejection::INVALID_TOKEN] {
            let ApiError(e) = rejected(r);
            assert_eq!(e.http_status(), r.status);
            assert_eq!(e.public_message(), r.reason);
        }
        let ApiError(e) = rejected(Rejection { reason: "bad header", status: 400 });
        assert_eq!(e.http_status(), 400);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let ApiError(e) = extract(None).await.unwrap_err();
        assert_eq!(e.http_status(), 401);
        assert_eq!(e.public_message(), Rejection::MISSING_CREDENTIAL.reason);
    }

    #[tokio::test]
    async fn verified_token_yields_caller() {
        let caller = extract(Some("Bearer token-user-42")).await.unwrap();
        assert_eq!(caller.subject_id(), "user-42");
    }

    #[tokio::test]
    async fn provider_outage_is_internal() {
        let ApiError(e) = extract(Some("Bearer outage")).await.unwrap_err();
        assert_eq!(e.http_status(), 500);
    }
}
