//! Axum middleware pieces applied to the router.
//!
//! Includes request tracing, request ids, timeout enforcement, and response
//! compression.

use std::time::Duration;

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Per-request timeout applied to all routes.
///
/// This is also the upper bound on identity-provider verification, which has
/// no timeout of its own.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Assigns a random UUID v4 `x-request-id` to requests that arrive without one.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}
