//! Axum request handlers for all service endpoints.
//!
//! Every handler that touches property records takes a [`VerifiedCaller`]
//! as its first extractor.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    CallerProfile, ErrorResponse, HealthResponse, PropertyList, PropertyRecord, PropertyRequest,
};

use super::{error::ApiError, state::AppState};
use crate::auth::VerifiedCaller;

/// `POST /properties` — encrypt and store a new property.
pub async fn create_property(
    caller: VerifiedCaller,
    State(state): State<AppState>,
    Json(req): Json<PropertyRequest>,
) -> Result<(StatusCode, Json<PropertyRecord>), ApiError> {
    let record = state.records.create(&caller, req.details).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /properties` — all of the caller's properties, decrypted.
pub async fn list_properties(
    caller: VerifiedCaller,
    State(state): State<AppState>,
) -> Result<Json<PropertyList>, ApiError> {
    let properties = state.records.list(&caller).await?;
    Ok(Json(PropertyList { properties }))
}

/// `GET /properties/:id`
pub async fn get_property(
    caller: VerifiedCaller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PropertyRecord>, ApiError> {
    Ok(Json(state.records.get(&caller, id).await?))
}

/// `PUT /properties/:id` — replace a property's details.
pub async fn update_property(
    caller: VerifiedCaller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PropertyRequest>,
) -> Result<Json<PropertyRecord>, ApiError> {
    Ok(Json(state.records.update(&caller, id, req.details).await?))
}

/// `DELETE /properties/:id`
pub async fn delete_property(
    caller: VerifiedCaller,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.records.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /me` — what the provider says about the caller.
pub async fn me(caller: VerifiedCaller) -> Json<CallerProfile> {
    Json(CallerProfile {
        subject_id: caller.subject_id().to_owned(),
        email: caller.email().map(str::to_owned),
        email_verified: caller.email_verified(),
    })
}

/// `GET /health` — liveness and readiness check. Unauthenticated.
///
/// Returns `200 OK` when the record store answers, `503` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let storage_ready = state.records.storage_ready().await;

    let (status_code, status_str) = if storage_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        storage_ready,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
