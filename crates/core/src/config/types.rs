use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// qBittorrent instances making up the fleet, in configuration order.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub liveness: LivenessConfig,
}

/// HTTP control API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// One qBittorrent WebUI endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Base address (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Periodic version-check probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_liveness_interval")]
    pub interval_secs: u64,
    /// Timeout for each individual version call.
    #[serde(default = "default_liveness_timeout")]
    pub timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_liveness_interval(),
            timeout_secs: default_liveness_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_liveness_interval() -> u64 {
    60
}

fn default_liveness_timeout() -> u64 {
    5
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub endpoints: Vec<SanitizedEndpointConfig>,
    pub liveness: LivenessConfig,
}

/// Endpoint with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEndpointConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            endpoints: config
                .endpoints
                .iter()
                .map(|e| SanitizedEndpointConfig {
                    url: e.url.clone(),
                    username: e.username.clone(),
                    password_configured: !e.password.is_empty(),
                    timeout_secs: e.timeout_secs,
                })
                .collect(),
            liveness: config.liveness.clone(),
        }
    }
}
