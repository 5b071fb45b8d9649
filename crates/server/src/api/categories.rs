//! Category API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use qbfleet_core::{Category, InstanceFailure, ReconcileError, SyncReport};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::handlers::{api_error, instance_error_status, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
    pub count: usize,
    pub errors: Vec<InstanceFailure>,
}

/// GET /api/v1/categories
///
/// Union of every instance's categories, sorted by name.
pub async fn list_categories(State(state): State<Arc<AppState>>) -> Json<CategoryListResponse> {
    let union = state
        .reconciler()
        .compute_union(&CancellationToken::new())
        .await;

    let categories: Vec<Category> = union.categories.into_values().collect();
    Json(CategoryListResponse {
        count: categories.len(),
        categories,
        errors: union.failures,
    })
}

/// POST /api/v1/categories/sync
///
/// Create missing categories on every instance. A create rejected by an
/// instance as a conflict maps to 409.
pub async fn sync_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncReport>, ApiError> {
    state
        .reconciler()
        .sync(&CancellationToken::new())
        .await
        .map(Json)
        .map_err(|e| {
            let status = match &e {
                ReconcileError::Create { source, .. } => instance_error_status(source),
                ReconcileError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            };
            api_error(status, e.to_string())
        })
}
