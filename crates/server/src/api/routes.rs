use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{categories, handlers, instances, middleware::metrics_middleware, torrents};
use crate::state::AppState;

/// Largest accepted upload request (all .torrent parts together).
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Instances
        .route("/instances", get(instances::list_instances))
        // Torrents (fan-out reads, single-instance writes)
        .route("/torrents", get(torrents::list_torrents))
        .route("/torrents/abandoned", get(torrents::list_abandoned))
        .route(
            "/torrents/upload",
            post(torrents::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/torrents/{instance}/{hash}", get(torrents::get_torrent))
        .route("/torrents/{instance}/{hash}/trackers", get(torrents::get_trackers))
        .route("/torrents/{instance}/{hash}/files", get(torrents::get_files))
        .route("/torrents/{instance}/pause", post(torrents::pause_torrents))
        .route("/torrents/{instance}/resume", post(torrents::resume_torrents))
        // Categories
        .route("/categories", get(categories::list_categories))
        .route("/categories/sync", post(categories::sync_categories))
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
