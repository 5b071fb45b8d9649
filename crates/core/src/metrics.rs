//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Per-instance WebUI requests
//! - Fleet-wide fan-out queries
//! - Category reconciliation
//! - Liveness probing

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Instance Metrics
// =============================================================================

/// Requests sent to instances, by operation and result.
pub static INSTANCE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "qbfleet_instance_requests_total",
            "Total requests sent to qBittorrent instances",
        ),
        &["operation", "result"], // result: "ok", "error"
    )
    .unwrap()
});

/// Live sessions after registry initialization.
pub static REGISTRY_INSTANCES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "qbfleet_registry_instances",
        "Number of authenticated instances in the registry",
    )
    .unwrap()
});

// =============================================================================
// Fleet Metrics
// =============================================================================

/// Wall time of a fan-out query across the fleet.
pub static FANOUT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "qbfleet_fanout_duration_seconds",
            "Duration of fleet-wide fan-out queries",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// Category creations issued by reconciliation.
pub static CATEGORIES_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "qbfleet_categories_created_total",
            "Categories created on instances during sync",
        ),
        &["result"],
    )
    .unwrap()
});

/// Liveness probe checks.
pub static LIVENESS_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "qbfleet_liveness_checks_total",
            "Version checks performed by the liveness probe",
        ),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(INSTANCE_REQUESTS.clone()),
        Box::new(REGISTRY_INSTANCES.clone()),
        Box::new(FANOUT_DURATION.clone()),
        Box::new(CATEGORIES_CREATED.clone()),
        Box::new(LIVENESS_CHECKS.clone()),
    ]
}
