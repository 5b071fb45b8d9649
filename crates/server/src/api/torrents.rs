//! Torrent API handlers.
//!
//! Listing endpoints fan out to the whole fleet and return partial results
//! with an `errors` list; they never fail because one instance did.
//! Per-torrent endpoints address one instance by its base address, which must
//! be percent-encoded in the path (`http%3A%2F%2Fqb1%3A8080`).

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use qbfleet_core::{
    fanout, find_abandoned, AbandonedTorrent, InstanceApi, InstanceFailure, InstanceId,
    RouteError, TorrentFile, TorrentRecord, TrackerRecord, UploadFile,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::handlers::{api_error, instance_error_status, ApiError};
use crate::output::{sort_abandoned, sort_torrents};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HashesRequest {
    pub hashes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TorrentListResponse {
    pub torrents: Vec<TorrentRecord>,
    pub count: usize,
    pub errors: Vec<InstanceFailure>,
}

#[derive(Debug, Serialize)]
pub struct AbandonedListResponse {
    pub torrents: Vec<AbandonedTorrent>,
    pub count: usize,
    pub errors: Vec<InstanceFailure>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub instance: InstanceId,
    pub category: String,
    pub files: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/torrents
///
/// Every torrent on every instance, sorted by instance then name.
pub async fn list_torrents(State(state): State<Arc<AppState>>) -> Json<TorrentListResponse> {
    let instances = state.registry().all().await;
    let result = fanout::list_torrents(&instances, &CancellationToken::new()).await;

    let mut torrents = result.items;
    sort_torrents(&mut torrents);
    Json(TorrentListResponse {
        count: torrents.len(),
        torrents,
        errors: result.failures,
    })
}

/// GET /api/v1/torrents/abandoned
///
/// Torrents whose tracker reports them as deleted.
pub async fn list_abandoned(State(state): State<Arc<AppState>>) -> Json<AbandonedListResponse> {
    let instances = state.registry().all().await;
    let result = find_abandoned(&instances, &CancellationToken::new()).await;

    let mut torrents = result.items;
    sort_abandoned(&mut torrents);
    Json(AbandonedListResponse {
        count: torrents.len(),
        torrents,
        errors: result.failures,
    })
}

/// GET /api/v1/torrents/{instance}/{hash}
///
/// One torrent from one instance. A hash the instance does not know is 404.
pub async fn get_torrent(
    State(state): State<Arc<AppState>>,
    Path((instance, hash)): Path<(String, String)>,
) -> Result<Json<TorrentRecord>, ApiError> {
    let session = require_instance(&state, &instance).await?;
    session
        .get_torrent(&hash)
        .await
        .map(Json)
        .map_err(|e| api_error(instance_error_status(&e), e.to_string()))
}

/// GET /api/v1/torrents/{instance}/{hash}/trackers
pub async fn get_trackers(
    State(state): State<Arc<AppState>>,
    Path((instance, hash)): Path<(String, String)>,
) -> Result<Json<Vec<TrackerRecord>>, ApiError> {
    let session = require_instance(&state, &instance).await?;
    session
        .get_trackers(&hash)
        .await
        .map(Json)
        .map_err(|e| api_error(instance_error_status(&e), e.to_string()))
}

/// GET /api/v1/torrents/{instance}/{hash}/files
pub async fn get_files(
    State(state): State<Arc<AppState>>,
    Path((instance, hash)): Path<(String, String)>,
) -> Result<Json<Vec<TorrentFile>>, ApiError> {
    let session = require_instance(&state, &instance).await?;
    session
        .list_files(&hash)
        .await
        .map(Json)
        .map_err(|e| api_error(instance_error_status(&e), e.to_string()))
}

/// POST /api/v1/torrents/{instance}/pause
pub async fn pause_torrents(
    State(state): State<Arc<AppState>>,
    Path(instance): Path<String>,
    Json(request): Json<HashesRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if request.hashes.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No hashes provided"));
    }
    let session = require_instance(&state, &instance).await?;
    session
        .pause_torrents(&request.hashes)
        .await
        .map_err(|e| api_error(instance_error_status(&e), e.to_string()))?;

    Ok(Json(SuccessResponse {
        message: format!("Paused {} torrent(s)", request.hashes.len()),
    }))
}

/// POST /api/v1/torrents/{instance}/resume
pub async fn resume_torrents(
    State(state): State<Arc<AppState>>,
    Path(instance): Path<String>,
    Json(request): Json<HashesRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if request.hashes.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No hashes provided"));
    }
    let session = require_instance(&state, &instance).await?;
    session
        .resume_torrents(&request.hashes)
        .await
        .map_err(|e| api_error(instance_error_status(&e), e.to_string()))?;

    Ok(Json(SuccessResponse {
        message: format!("Resumed {} torrent(s)", request.hashes.len()),
    }))
}

/// POST /api/v1/torrents/upload
///
/// Multipart form with a `category` field and one or more `torrents` file
/// parts. The files go to one instance that already has the category.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut category: Option<String> = None;
    let mut files: Vec<UploadFile> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart body: {}", e),
                ))
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "category" => {
                let text = field.text().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Failed to read category: {}", e))
                })?;
                category = Some(text);
            }
            "torrents" => {
                let filename = field.file_name().unwrap_or("upload.torrent").to_string();
                let data = field.bytes().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?;
                files.push(UploadFile::new(filename, data));
            }
            _ => {}
        }
    }

    let category = match category {
        Some(c) if !c.is_empty() => c,
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "No category provided")),
    };

    let count = files.len();
    match state
        .upload_router()
        .route(&category, files, &CancellationToken::new())
        .await
    {
        Ok(instance) => Ok(Json(UploadResponse {
            instance,
            category,
            files: count,
        })),
        Err(e) => Err(api_error(route_error_status(&e), e.to_string())),
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn require_instance(
    state: &AppState,
    instance: &str,
) -> Result<Arc<dyn InstanceApi>, ApiError> {
    state
        .registry()
        .require(instance)
        .await
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))
}

fn route_error_status(error: &RouteError) -> StatusCode {
    match error {
        RouteError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
        RouteError::NoFiles => StatusCode::BAD_REQUEST,
        RouteError::InstanceUnavailable(_) | RouteError::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RouteError::Upload(failure) => instance_error_status(&failure.error),
    }
}
