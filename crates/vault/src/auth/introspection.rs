//! [`TokenVerifier`] backed by an OAuth 2.0 token introspection endpoint
//! (RFC 7662).
//!
//! The provider evaluates the token at call time, so a session revoked on the
//! provider side is reported as `active: false` on the very next request.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::{header, Method, Request, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::OnceCell;
use tracing::debug;
use zeroize::Zeroizing;

use super::verifier::{Claims, TokenVerifier, VerifyError};

/// Upper bound on an introspection response body.
const MAX_RESPONSE_BYTES: usize = 64 * 1024;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Verifies tokens by asking the provider's introspection endpoint.
///
/// The HTTP client is built on first use and then shared by every request.
pub struct IntrospectionVerifier {
    endpoint: Uri,
    /// Precomputed `Basic` client credentials.
    authorization: Zeroizing<String>,
    client: OnceCell<HttpsClient>,
}

impl IntrospectionVerifier {
    /// Create a verifier for `endpoint`, authenticating as `client_id`.
    ///
    /// No connection is made until the first token is verified.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid URI.
    pub fn new(endpoint: &str, client_id: &str, client_secret: &str) -> Result<Self> {
        let endpoint: Uri = endpoint
            .parse()
            .context("IDP_INTROSPECTION_URL is not a valid URI")?;
        let credentials = Zeroizing::new(format!("{client_id}:{client_secret}"));
        Ok(Self {
            endpoint,
            authorization: Zeroizing::new(format!("Basic {}", STANDARD.encode(credentials.as_bytes()))),
            client: OnceCell::new(),
        })
    }

    /// The shared client, building it if this is the first call.
    ///
    /// Concurrent first callers wait on the same initialisation; exactly one
    /// client is retained.
    async fn client(&self) -> Result<&HttpsClient, VerifyError> {
        self.client
            .get_or_try_init(|| async {
                let https = hyper_rustls::HttpsConnectorBuilder::new()
                    .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
                    .map_err(|e| VerifyError::Unavailable(format!("tls setup failed: {e}")))?
                    .https_or_http()
                    .enable_http1()
                    .build();
                debug!("identity provider client initialised");
                Ok::<_, VerifyError>(Client::builder(TokioExecutor::new()).build(https))
            })
            .await
    }
}

#[async_trait]
impl TokenVerifier for IntrospectionVerifier {
    /// Introspection always reflects the provider's current session state, so
    /// revocation is observed whether or not `check_revoked` is set.
    async fn verify_token(&self, token: &str, _check_revoked: bool) -> Result<Claims, VerifyError> {
        let client = self.client().await?;

        let form = Zeroizing::new(
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("token", token)
                .append_pair("token_type_hint", "access_token")
                .finish(),
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::AUTHORIZATION, self.authorization.as_str())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(Body::from(form.to_string()))
            .map_err(|e| VerifyError::Unavailable(format!("invalid introspection request: {e}")))?;

        let response = client
            .request(request)
            .await
            .map_err(|e| VerifyError::Unavailable(format!("introspection request failed: {e}")))?;

        let status = response.status();
        let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| VerifyError::Unavailable(format!("failed to read introspection body: {e}")))?;

        claims_from_response(status, &body, unix_now())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Interpret an introspection response at time `now` (unix seconds).
fn claims_from_response(status: StatusCode, body: &[u8], now: u64) -> Result<Claims, VerifyError> {
    if !status.is_success() {
        return Err(VerifyError::Unavailable(format!(
            "introspection endpoint returned {status}"
        )));
    }
    let claims: Claims = serde_json::from_slice(body)
        .map_err(|_| VerifyError::Unavailable("malformed introspection response".into()))?;

    let active = claims
        .get("active")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !active {
        return Err(VerifyError::Inactive);
    }

    // The provider should already have checked these; a clock-skewed or
    // misbehaving provider still must not let a stale token through.
    if let Some(exp) = claims.get("exp").and_then(|v| v.as_u64()) {
        if exp <= now {
            return Err(VerifyError::Expired);
        }
    }
    if let Some(nbf) = claims.get("nbf").and_then(|v| v.as_u64()) {
        if nbf > now {
            return Err(VerifyError::Expired);
        }
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn active_token_returns_claims() {
        let body = br#"{"active":true,"sub":"user-42","email":"a@b.c","exp":1700000600}"#;
        let claims = claims_from_response(StatusCode::OK, body, NOW).unwrap();
        assert_eq!(claims["sub"], "user-42");
    }

    #[test]
    fn inactive_token_rejected() {
        let err = claims_from_response(StatusCode::OK, br#"{"active":false}"#, NOW).unwrap_err();
        assert!(matches!(err, VerifyError::Inactive));
        assert!(err.is_credential_failure());
    }

    #[test]
    fn missing_active_flag_treated_as_inactive() {
        let err = claims_from_response(StatusCode::OK, br#"{"sub":"x"}"#, NOW).unwrap_err();
        assert!(matches!(err, VerifyError::Inactive));
    }

    #[test]
    fn expired_token_rejected_even_if_active() {
        let body = br#"{"active":true,"sub":"x","exp":1699999999}"#;
        let err = claims_from_response(StatusCode::OK, body, NOW).unwrap_err();
        assert!(matches!(err, VerifyError::Expired));
    }

    #[test]
    fn not_yet_valid_token_rejected() {
        let body = br#"{"active":true,"sub":"x","nbf":1700000100}"#;
        let err = claims_from_response(StatusCode::OK, body, NOW).unwrap_err();
        assert!(matches!(err, VerifyError::Expired));
    }

    #[test]
    fn provider_error_status_is_unavailable() {
        let err = claims_from_response(StatusCode::UNAUTHORIZED, b"{}", NOW).unwrap_err();
        assert!(!err.is_credential_failure());
        let err = claims_from_response(StatusCode::BAD_GATEWAY, b"", NOW).unwrap_err();
        assert!(!err.is_credential_failure());
    }

    #[test]
    fn garbage_body_is_unavailable() {
        let err = claims_from_response(StatusCode::OK, b"<html>", NOW).unwrap_err();
        assert!(matches!(err, VerifyError::Unavailable(_)));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(IntrospectionVerifier::new("not a uri", "id", "secret").is_err());
        assert!(IntrospectionVerifier::new("https://idp.example.com/introspect", "id", "secret").is_ok());
    }

    mod over_http {
        use super::*;
        use axum::{extract::State, http::HeaderMap, routing::post, Form, Json, Router};
        use parking_lot::Mutex;
        use serde_json::{json, Value};
        use std::{collections::HashMap, net::SocketAddr, sync::Arc};

        /// One request as the provider saw it.
        #[derive(Debug, Clone)]
        struct Received {
            authorization: Option<String>,
            content_type: Option<String>,
            form: HashMap<String, String>,
        }

        type Log = Arc<Mutex<Vec<Received>>>;

        const GOOD_TOKEN: &str = "a+b/c=d";

        async fn introspect(
            State(log): State<Log>,
            headers: HeaderMap,
            Form(form): Form<HashMap<String, String>>,
        ) -> Json<Value> {
            let value_of = |name: header::HeaderName| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            let active = form.get("token").map(String::as_str) == Some(GOOD_TOKEN);
            log.lock().push(Received {
                authorization: value_of(header::AUTHORIZATION),
                content_type: value_of(header::CONTENT_TYPE),
                form,
            });
            if active {
                Json(json!({"active": true, "sub": "user-42"}))
            } else {
                Json(json!({"active": false}))
            }
        }

        async fn oversized() -> String {
            "x".repeat(MAX_RESPONSE_BYTES + 1)
        }

        async fn provider() -> (SocketAddr, Log) {
            let log = Log::default();
            let app = Router::new()
                .route("/introspect", post(introspect))
                .route("/oversized", post(oversized))
                .with_state(log.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (addr, log)
        }

        fn verifier(addr: SocketAddr, path: &str) -> IntrospectionVerifier {
            IntrospectionVerifier::new(&format!("http://{addr}{path}"), "id", "secret").unwrap()
        }

        #[tokio::test]
        async fn posts_form_with_client_credentials() {
            let (addr, log) = provider().await;
            let v = verifier(addr, "/introspect");

            let claims = v.verify_token(GOOD_TOKEN, true).await.unwrap();
            assert_eq!(claims["sub"], "user-42");

            let received = log.lock().clone();
            assert_eq!(received.len(), 1);
            let req = &received[0];
            assert_eq!(req.authorization.as_deref(), Some("Basic aWQ6c2VjcmV0"));
            assert_eq!(
                req.content_type.as_deref(),
                Some("application/x-www-form-urlencoded")
            );
            assert_eq!(req.form.get("token").map(String::as_str), Some(GOOD_TOKEN));
            assert_eq!(
                req.form.get("token_type_hint").map(String::as_str),
                Some("access_token")
            );
        }

        #[tokio::test]
        async fn inactive_answer_is_credential_failure() {
            let (addr, _log) = provider().await;
            let err = verifier(addr, "/introspect")
                .verify_token("some-other-token", true)
                .await
                .unwrap_err();
            assert!(matches!(err, VerifyError::Inactive));
        }

        #[tokio::test]
        async fn oversized_body_is_unavailable() {
            let (addr, _log) = provider().await;
            let err = verifier(addr, "/oversized")
                .verify_token(GOOD_TOKEN, true)
                .await
                .unwrap_err();
            assert!(matches!(err, VerifyError::Unavailable(_)));
        }

        #[tokio::test]
        async fn unreachable_provider_is_unavailable() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            let err = verifier(addr, "/introspect")
                .verify_token(GOOD_TOKEN, true)
                .await
                .unwrap_err();
            assert!(!err.is_credential_failure());
        }

        #[tokio::test]
        async fn client_is_built_once_and_shared() {
            let (addr, log) = provider().await;
            let v = verifier(addr, "/introspect");
            assert!(v.client.get().is_none());

            v.verify_token(GOOD_TOKEN, true).await.unwrap();
            let first: *const HttpsClient = v.client.get().unwrap();
            v.verify_token(GOOD_TOKEN, true).await.unwrap();
            let second: *const HttpsClient = v.client.get().unwrap();

            assert_eq!(first, second);
            assert_eq!(log.lock().len(), 2);
        }
    }

    #[test]
    fn basic_credentials_precomputed() {
        let v = IntrospectionVerifier::new("https://idp.example.com/introspect", "id", "secret")
            .unwrap();
        assert_eq!(v.authorization.as_str(), "Basic aWQ6c2VjcmV0");
    }
}
