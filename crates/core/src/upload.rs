//! Upload routing.
//!
//! An upload lands on exactly one instance: the first one recorded as holding
//! the target category. Uploads are never fanned out.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::instance::{InstanceFailure, InstanceId, UploadFile};
use crate::reconcile::CategoryReconciler;
use crate::registry::InstanceRegistry;

/// Errors from routing an upload.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("No torrent files to upload")]
    NoFiles,

    #[error("Instance not available: {0}")]
    InstanceUnavailable(InstanceId),

    #[error("Upload failed: {0}")]
    Upload(#[from] InstanceFailure),

    #[error("Upload cancelled")]
    Cancelled,
}

/// Routes .torrent uploads to an instance holding the target category.
pub struct UploadRouter {
    registry: Arc<InstanceRegistry>,
    reconciler: CategoryReconciler,
}

impl UploadRouter {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self {
            reconciler: CategoryReconciler::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// Upload `files` into `category` and return the instance that took them.
    ///
    /// The category is resolved against a fresh union. An unknown category
    /// fails before any instance receives an upload call. `files` is consumed
    /// whatever the outcome.
    pub async fn route(
        &self,
        category: &str,
        files: Vec<UploadFile>,
        cancel: &CancellationToken,
    ) -> Result<InstanceId, RouteError> {
        if files.is_empty() {
            return Err(RouteError::NoFiles);
        }

        let union = self.reconciler.compute_union(cancel).await;
        if cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }
        for failure in &union.failures {
            warn!(
                instance = %failure.instance,
                error = %failure.error,
                "Category listing failed while routing upload"
            );
        }

        let target = union
            .get(category)
            .and_then(|c| c.first_instance())
            .cloned()
            .ok_or_else(|| RouteError::CategoryNotFound(category.to_string()))?;

        let instance = self
            .registry
            .lookup(target.as_str())
            .await
            .ok_or_else(|| RouteError::InstanceUnavailable(target.clone()))?;

        let count = files.len();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RouteError::Cancelled),
            result = instance.upload(files, category) => {
                result.map_err(|e| InstanceFailure::new(target.clone(), e))?;
                info!(instance = %target, category, files = count, "Uploaded torrents");
                Ok(target)
            }
        }
    }
}
