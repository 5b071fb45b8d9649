use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use qbfleet_core::{InstanceError, SanitizedConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// HTTP status for an error reported by an instance.
pub fn instance_error_status(error: &InstanceError) -> StatusCode {
    match error {
        InstanceError::TorrentNotFound(_) => StatusCode::NOT_FOUND,
        InstanceError::CategoryConflict(_) => StatusCode::CONFLICT,
        InstanceError::CategoryNameEmpty => StatusCode::BAD_REQUEST,
        InstanceError::UnsupportedFile(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        InstanceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        InstanceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /api/v1/metrics
///
/// Prometheus text exposition.
pub async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
