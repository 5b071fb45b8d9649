use std::sync::Arc;

use qbfleet_core::{
    CategoryReconciler, Config, InstanceRegistry, LivenessProbe, SanitizedConfig, UploadRouter,
};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: Arc<InstanceRegistry>,
    reconciler: CategoryReconciler,
    upload_router: UploadRouter,
    liveness: LivenessProbe,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<InstanceRegistry>) -> Self {
        Self {
            reconciler: CategoryReconciler::new(Arc::clone(&registry)),
            upload_router: UploadRouter::new(Arc::clone(&registry)),
            liveness: LivenessProbe::new(Arc::clone(&registry), &config.liveness),
            config,
            registry,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn reconciler(&self) -> &CategoryReconciler {
        &self.reconciler
    }

    pub fn upload_router(&self) -> &UploadRouter {
        &self.upload_router
    }

    pub fn liveness(&self) -> &LivenessProbe {
        &self.liveness
    }
}
