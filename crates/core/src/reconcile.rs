//! Category reconciliation.
//!
//! The fleet's category set is the union of every instance's categories.
//! `sync` pushes the missing part of that union to each instance so all of
//! them end up with the same set.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fanout::{self, FanOut};
use crate::instance::{CategoryInfo, InstanceError, InstanceFailure, InstanceId};
use crate::metrics;
use crate::registry::InstanceRegistry;

/// A category as seen across the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
    /// Save path reported by the first instance that defines the category.
    pub save_path: String,
    /// Instances that define the category, in the order they were folded in.
    pub instances: Vec<InstanceId>,
}

impl Category {
    pub fn has_instance(&self, id: &InstanceId) -> bool {
        self.instances.contains(id)
    }

    /// Instance uploads for this category are routed to.
    pub fn first_instance(&self) -> Option<&InstanceId> {
        self.instances.first()
    }
}

/// Union of every instance's categories, keyed by name.
#[derive(Debug, Default)]
pub struct CategoryUnion {
    pub categories: BTreeMap<String, Category>,
    /// Instances whose listing failed. They are members of no category.
    pub failures: Vec<InstanceFailure>,
}

impl CategoryUnion {
    /// Fold per-instance listings into one map.
    ///
    /// Listings are folded in instance id order. A name seen for the first
    /// time takes that instance's save path; later instances are only added to
    /// the member list, their save path is ignored.
    pub fn fold(listing: FanOut<(InstanceId, CategoryInfo)>) -> Self {
        let FanOut {
            mut items,
            failures,
        } = listing;
        // Stable: keeps each instance's own order.
        items.sort_by(|a, b| a.0.cmp(&b.0));

        let mut categories: BTreeMap<String, Category> = BTreeMap::new();
        for (instance, info) in items {
            match categories.get_mut(&info.name) {
                Some(category) => {
                    if category.save_path != info.save_path {
                        debug!(
                            category = %info.name,
                            instance = %instance,
                            kept = %category.save_path,
                            ignored = %info.save_path,
                            "Divergent save path for category"
                        );
                    }
                    if !category.has_instance(&instance) {
                        category.instances.push(instance);
                    }
                }
                None => {
                    categories.insert(
                        info.name.clone(),
                        Category {
                            name: info.name,
                            save_path: info.save_path,
                            instances: vec![instance],
                        },
                    );
                }
            }
        }

        Self {
            categories,
            failures,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn failed(&self) -> HashSet<&InstanceId> {
        self.failures.iter().map(|f| &f.instance).collect()
    }
}

/// Outcome of a successful sync.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    /// Categories created, as (instance, category name).
    pub created: Vec<(InstanceId, String)>,
    /// Instances left alone because their categories could not be listed.
    pub skipped: Vec<InstanceFailure>,
}

impl SyncReport {
    /// True when nothing had to be created.
    pub fn is_converged(&self) -> bool {
        self.created.is_empty()
    }
}

/// Errors that stop a sync.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to create category {category:?} on {instance}: {source}")]
    Create {
        instance: InstanceId,
        category: String,
        #[source]
        source: InstanceError,
    },

    #[error("Sync cancelled")]
    Cancelled,
}

/// Computes the category union and converges instances to it.
pub struct CategoryReconciler {
    registry: Arc<InstanceRegistry>,
}

impl CategoryReconciler {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// List every instance's categories concurrently and fold them.
    pub async fn compute_union(&self, cancel: &CancellationToken) -> CategoryUnion {
        let instances = self.registry.all().await;
        CategoryUnion::fold(fanout::list_categories(&instances, cancel).await)
    }

    /// Create every union category an instance is missing.
    ///
    /// Instances already holding a category are not contacted for it, so a
    /// second run on an unchanged fleet issues no creates. The first failed
    /// create ends the sync and is returned, a conflict included.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<SyncReport, ReconcileError> {
        let union = self.compute_union(cancel).await;
        if cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }

        let failed = union.failed();
        let mut report = SyncReport::default();

        for instance in self.registry.all().await {
            let id = instance.id();
            if failed.contains(id) {
                warn!(
                    instance = %id,
                    "Skipping category sync for instance whose categories could not be listed"
                );
                continue;
            }

            for category in union.categories.values() {
                if category.has_instance(id) {
                    continue;
                }
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ReconcileError::Cancelled),
                    result = instance.create_category(&category.name, &category.save_path) => result,
                };

                match result {
                    Ok(()) => {
                        metrics::CATEGORIES_CREATED.with_label_values(&["ok"]).inc();
                        info!(
                            instance = %id,
                            category = %category.name,
                            save_path = %category.save_path,
                            "Created category"
                        );
                        report.created.push((id.clone(), category.name.clone()));
                    }
                    Err(e) => {
                        metrics::CATEGORIES_CREATED.with_label_values(&["error"]).inc();
                        return Err(ReconcileError::Create {
                            instance: id.clone(),
                            category: category.name.clone(),
                            source: e,
                        });
                    }
                }
            }
        }

        report.skipped = union.failures;
        if report.is_converged() {
            debug!("Categories already in sync");
        }
        Ok(report)
    }
}
