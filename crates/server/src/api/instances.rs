//! Instance API handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use qbfleet_core::LivenessReport;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InstanceListResponse {
    pub instances: Vec<LivenessReport>,
    pub count: usize,
}

/// GET /api/v1/instances
///
/// Live instances and the API version each one reports right now.
pub async fn list_instances(State(state): State<Arc<AppState>>) -> Json<InstanceListResponse> {
    let instances = state.liveness().check_once().await;
    Json(InstanceListResponse {
        count: instances.len(),
        instances,
    })
}
