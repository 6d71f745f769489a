//! Mapping from internal failures to HTTP responses.
//!
//! This is the only place error kinds become status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, ServiceError};
use tracing::{error, warn};

use crate::crypto::CipherError;
use crate::records::RecordError;
use crate::storage::StoreError;

/// A [`ServiceError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl From<CipherError> for ApiError {
    fn from(e: CipherError) -> Self {
        let detail = e.to_string();
        Self(match e {
            CipherError::Integrity | CipherError::Encoding | CipherError::Decoding => {
                ServiceError::IntegrityFailure(detail)
            }
            CipherError::Encryption => ServiceError::EncryptionFailure(detail),
            CipherError::Key(k) if k.is_configuration() => ServiceError::Unavailable(detail),
            CipherError::Key(_) => ServiceError::Internal(detail),
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(match e {
            StoreError::Unavailable(_) => ServiceError::Unavailable(e.to_string()),
            StoreError::Query { .. } | StoreError::Task(_) => ServiceError::Internal(e.to_string()),
        })
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound(id) => {
                Self(ServiceError::NotFound(format!("property {id} not found")))
            }
            RecordError::InvalidDetails => Self(ServiceError::BadRequest(
                "property details must be a JSON object".into(),
            )),
            RecordError::Cipher(c) => c.into(),
            RecordError::Key(k) => CipherError::Key(k).into(),
            RecordError::Store(s) => s.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), code = self.0.code(), "request rejected");
        }
        let body = ErrorResponse::new(self.0.code(), self.0.public_message());
        (status, Json(body)).into_response()
    }
}
