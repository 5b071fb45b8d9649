//! Concurrent fan-out across instances.
//!
//! The same query is dispatched to every instance on its own task. Results and
//! errors are collected independently, and the caller only gets control back
//! once every instance has answered (or the caller cancelled).

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::instance::{
    CategoryInfo, InstanceApi, InstanceError, InstanceFailure, InstanceId, TorrentRecord,
};
use crate::metrics;

/// Merged output of a fan-out query.
#[derive(Debug)]
pub struct FanOut<T> {
    /// Successful results. Order across instances is unspecified; order within
    /// one instance's batch is preserved.
    pub items: Vec<T>,
    /// One entry per instance that failed.
    pub failures: Vec<InstanceFailure>,
}

impl<T> Default for FanOut<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> FanOut<T> {
    /// True when every instance answered successfully.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(
        &mut self,
        operation: &str,
        instance: InstanceId,
        result: Result<Vec<T>, InstanceError>,
    ) {
        match result {
            Ok(mut batch) => {
                debug!(operation, instance = %instance, count = batch.len(), "Instance answered");
                self.items.append(&mut batch);
            }
            Err(e) => {
                warn!(operation, instance = %instance, error = %e, "Instance query failed");
                self.failures.push(InstanceFailure::new(instance, e));
            }
        }
    }
}

/// Run `op` against every instance in parallel and merge the outcomes.
///
/// A failing instance never discards another instance's results. When `cancel`
/// fires, in-flight queries are aborted, results that already arrived are kept,
/// and each unfinished instance is reported as `Cancelled`.
pub async fn fan_out<T, F, Fut>(
    operation: &'static str,
    instances: &[Arc<dyn InstanceApi>],
    cancel: &CancellationToken,
    op: F,
) -> FanOut<T>
where
    T: Send + 'static,
    F: Fn(Arc<dyn InstanceApi>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, InstanceError>> + Send + 'static,
{
    let start = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = JoinSet::new();
    let mut outstanding: HashSet<InstanceId> = HashSet::new();

    for instance in instances {
        let id = instance.id().clone();
        outstanding.insert(id.clone());

        let query = op(Arc::clone(instance));
        let tx = tx.clone();
        tasks.spawn(async move {
            let result = query.await;
            // The receiver is gone only if the caller stopped waiting.
            let _ = tx.send((id, result));
        });
    }
    drop(tx);

    let mut out = FanOut::default();
    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                cancelled = true;
                break;
            }
            message = rx.recv() => match message {
                Some((id, result)) => {
                    outstanding.remove(&id);
                    out.record(operation, id, result);
                }
                // Every sender dropped: all tasks have finished.
                None => break,
            }
        }
    }

    // Answers that were already queued when the cancellation was observed.
    while let Ok((id, result)) = rx.try_recv() {
        outstanding.remove(&id);
        out.record(operation, id, result);
    }

    let mut unfinished: Vec<InstanceId> = outstanding.into_iter().collect();
    unfinished.sort();
    for id in unfinished {
        let error = if cancelled {
            InstanceError::Cancelled
        } else {
            InstanceError::Internal("query task panicked".to_string())
        };
        out.record(operation, id, Err(error));
    }

    metrics::FANOUT_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    out
}

/// Every torrent on every instance.
pub async fn list_torrents(
    instances: &[Arc<dyn InstanceApi>],
    cancel: &CancellationToken,
) -> FanOut<TorrentRecord> {
    fan_out("list_torrents", instances, cancel, |instance| async move {
        instance.list_torrents().await
    })
    .await
}

/// Every category on every instance, tagged with the instance that reported it.
pub async fn list_categories(
    instances: &[Arc<dyn InstanceApi>],
    cancel: &CancellationToken,
) -> FanOut<(InstanceId, CategoryInfo)> {
    fan_out("list_categories", instances, cancel, tagged_categories).await
}

async fn tagged_categories(
    instance: Arc<dyn InstanceApi>,
) -> Result<Vec<(InstanceId, CategoryInfo)>, InstanceError> {
    let categories = instance.list_categories().await?;
    let id = instance.id();
    Ok(categories.into_iter().map(|c| (id.clone(), c)).collect())
}
