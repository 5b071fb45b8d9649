pub mod abandoned;
pub mod config;
pub mod fanout;
pub mod instance;
pub mod liveness;
pub mod metrics;
pub mod reconcile;
pub mod registry;
pub mod testing;
pub mod upload;

pub use abandoned::{find_abandoned, AbandonedTorrent};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EndpointConfig,
    LivenessConfig, SanitizedConfig, ServerConfig,
};
pub use fanout::{fan_out, FanOut};
pub use instance::{
    CategoryInfo, InstanceApi, InstanceError, InstanceFailure, InstanceId, QBittorrentSession,
    TorrentFile, TorrentRecord, TrackerRecord, TrackerStatus, UploadFile,
};
pub use liveness::{LivenessProbe, LivenessReport};
pub use reconcile::{Category, CategoryReconciler, CategoryUnion, ReconcileError, SyncReport};
pub use registry::{InstanceConnector, InstanceRegistry, RegistryError};
pub use upload::{RouteError, UploadRouter};
