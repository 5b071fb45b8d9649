//! Instance registry.
//!
//! Holds one authenticated session per configured endpoint. Sessions are
//! created on first use, exactly once, no matter how many callers race for
//! them; after that the registry is read-only for the life of the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::EndpointConfig;
use crate::instance::{InstanceApi, InstanceError, InstanceId, QBittorrentConnector};
use crate::metrics;

/// Sessions keyed by normalized base address.
pub type Sessions = BTreeMap<InstanceId, Arc<dyn InstanceApi>>;

/// Errors from explicit registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Instance not available: {0}")]
    UnknownInstance(String),
}

/// Creates an authenticated session for one endpoint.
#[async_trait]
pub trait InstanceConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<Arc<dyn InstanceApi>, InstanceError>;
}

/// Process-wide collection of instance sessions.
pub struct InstanceRegistry {
    endpoints: Vec<EndpointConfig>,
    connector: Arc<dyn InstanceConnector>,
    sessions: OnceCell<Sessions>,
}

impl InstanceRegistry {
    /// Registry that logs into qBittorrent on first use.
    pub fn new(endpoints: Vec<EndpointConfig>) -> Self {
        Self::with_connector(endpoints, Arc::new(QBittorrentConnector))
    }

    /// Registry with a custom session factory.
    pub fn with_connector(
        endpoints: Vec<EndpointConfig>,
        connector: Arc<dyn InstanceConnector>,
    ) -> Self {
        Self {
            endpoints,
            connector,
            sessions: OnceCell::new(),
        }
    }

    /// Registry over sessions that already exist.
    pub fn from_sessions(sessions: impl IntoIterator<Item = Arc<dyn InstanceApi>>) -> Self {
        let sessions: Sessions = sessions
            .into_iter()
            .map(|s| (s.id().clone(), s))
            .collect();
        metrics::REGISTRY_INSTANCES.set(sessions.len() as i64);

        Self {
            endpoints: Vec::new(),
            connector: Arc::new(QBittorrentConnector),
            sessions: OnceCell::new_with(Some(sessions)),
        }
    }

    /// Get the session map, authenticating against every endpoint on first call.
    ///
    /// Concurrent first callers all wait on the same initialization pass.
    /// Endpoints that fail to connect are logged and left out.
    pub async fn acquire(&self) -> &Sessions {
        self.sessions.get_or_init(|| self.initialize()).await
    }

    /// Every live session, ordered by instance id.
    pub async fn all(&self) -> Vec<Arc<dyn InstanceApi>> {
        self.acquire().await.values().cloned().collect()
    }

    /// Find a session by base address. The address is normalized first.
    pub async fn lookup(&self, base_address: &str) -> Option<Arc<dyn InstanceApi>> {
        let id = InstanceId::parse(base_address).ok()?;
        self.acquire().await.get(&id).cloned()
    }

    /// Like `lookup`, but an absent instance is an error.
    pub async fn require(&self, base_address: &str) -> Result<Arc<dyn InstanceApi>, RegistryError> {
        self.lookup(base_address)
            .await
            .ok_or_else(|| RegistryError::UnknownInstance(base_address.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.acquire().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.acquire().await.is_empty()
    }

    /// Whether the initialization pass has completed.
    pub fn is_initialized(&self) -> bool {
        self.sessions.initialized()
    }

    async fn initialize(&self) -> Sessions {
        info!(endpoints = self.endpoints.len(), "Connecting to qBittorrent instances");

        let attempts = self.endpoints.iter().map(|endpoint| async move {
            (endpoint, self.connector.connect(endpoint).await)
        });
        let results = futures::future::join_all(attempts).await;

        let mut sessions = Sessions::new();
        for (endpoint, result) in results {
            match result {
                Ok(session) => {
                    let id = session.id().clone();
                    if sessions.contains_key(&id) {
                        warn!(instance = %id, "Duplicate endpoint in configuration, ignoring");
                        continue;
                    }
                    info!(instance = %id, "Connected to instance");
                    sessions.insert(id, session);
                }
                Err(e) => {
                    error!(endpoint = %endpoint.url, error = %e, "Failed to connect to instance");
                }
            }
        }

        if sessions.is_empty() && !self.endpoints.is_empty() {
            error!("No qBittorrent instance could be reached");
        }
        metrics::REGISTRY_INSTANCES.set(sessions.len() as i64);
        sessions
    }
}
