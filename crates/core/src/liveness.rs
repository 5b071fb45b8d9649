//! Periodic liveness probe.
//!
//! Calls the cheap version endpoint on every live session at a fixed interval
//! and logs the outcome. Sessions are never rebuilt; a failing instance stays
//! in the registry and keeps being probed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::LivenessConfig;
use crate::instance::{InstanceApi, InstanceError, InstanceId};
use crate::metrics;
use crate::registry::InstanceRegistry;

/// Result of probing one instance.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub instance: InstanceId,
    /// WebUI API version, when the instance answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LivenessReport {
    pub fn is_alive(&self) -> bool {
        self.error.is_none()
    }
}

/// Background version checker for the whole fleet.
pub struct LivenessProbe {
    registry: Arc<InstanceRegistry>,
    interval: Duration,
    timeout: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl LivenessProbe {
    pub fn new(registry: Arc<InstanceRegistry>, config: &LivenessConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the probe loop (spawns a background task).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Liveness probe already running");
            return;
        }

        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        let timeout = self.timeout;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Liveness probe started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Liveness probe received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::probe(&registry, timeout).await;
                    }
                }
            }
            info!("Liveness probe stopped");
        });
    }

    /// Signal the probe loop to stop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Liveness probe not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Probe every instance once, concurrently.
    pub async fn check_once(&self) -> Vec<LivenessReport> {
        Self::probe(&self.registry, self.timeout).await
    }

    async fn probe(registry: &InstanceRegistry, timeout: Duration) -> Vec<LivenessReport> {
        let instances = registry.all().await;
        let checks = instances
            .iter()
            .map(|instance| check_instance(instance.as_ref(), timeout));
        futures::future::join_all(checks).await
    }
}

async fn check_instance(instance: &dyn InstanceApi, timeout: Duration) -> LivenessReport {
    let result = match tokio::time::timeout(timeout, instance.get_version()).await {
        Ok(result) => result,
        Err(_) => Err(InstanceError::Timeout),
    };

    match result {
        Ok(version) => {
            metrics::LIVENESS_CHECKS.with_label_values(&["ok"]).inc();
            debug!(instance = %instance.id(), version = %version, "Instance alive");
            LivenessReport {
                instance: instance.id().clone(),
                version: Some(version),
                error: None,
            }
        }
        Err(e) => {
            metrics::LIVENESS_CHECKS.with_label_values(&["error"]).inc();
            warn!(instance = %instance.id(), error = %e, "Liveness check failed");
            LivenessReport {
                instance: instance.id().clone(),
                version: None,
                error: Some(e.to_string()),
            }
        }
    }
}
