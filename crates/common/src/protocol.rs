//! Request and response types exchanged over the public HTTP API.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Property records
// ---------------------------------------------------------------------------

/// Request body for `POST /properties` and `PUT /properties/:id`.
///
/// `details` is an arbitrary JSON object. It is encrypted as a whole under the
/// caller's identity before it reaches storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRequest {
    /// Property details (name, address, units, ...). Must be a JSON object.
    pub details: serde_json::Value,
}

/// A single decrypted property record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Storage-assigned record id.
    pub id: i64,
    /// Decrypted property details.
    pub details: serde_json::Value,
}

/// Response body for `GET /properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyList {
    /// All records owned by the caller, ordered by id.
    pub properties: Vec<PropertyRecord>,
}

// ---------------------------------------------------------------------------
// Caller profile
// ---------------------------------------------------------------------------

/// Response body for `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerProfile {
    /// Provider-issued subject identifier.
    pub subject_id: String,
    /// Email address asserted by the provider, if any.
    pub email: Option<String>,
    /// Whether the provider has verified `email`.
    pub email_verified: bool,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"unauthorized"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the record store answered a ping.
    pub storage_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_request_accepts_nested_details() {
        let body = r#"{"details":{"name":"Oak St Apt","units":[{"no":"1A"}]}}"#;
        let req: PropertyRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.details["name"], "Oak St Apt");
        assert_eq!(req.details["units"][0]["no"], "1A");
    }

    #[test]
    fn property_list_serialises_in_order() {
        let list = PropertyList {
            properties: vec![
                PropertyRecord { id: 1, details: json!({"name": "a"}) },
                PropertyRecord { id: 2, details: json!({"name": "b"}) },
            ],
        };
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["properties"][1]["id"], 2);
    }

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("unauthorized", "invalid or expired token");
        assert_eq!(e.code, "unauthorized");
        assert!(e.message.contains("expired"));
    }

    #[test]
    fn caller_profile_omits_nothing() {
        let p = CallerProfile {
            subject_id: "user-42".into(),
            email: None,
            email_verified: false,
        };
        let value = serde_json::to_value(&p).unwrap();
        assert!(value["email"].is_null());
        assert_eq!(value["email_verified"], false);
    }
}
