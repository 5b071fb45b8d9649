use super::{types::Config, ConfigError};

/// Validate configuration.
///
/// Endpoint URLs are deliberately not checked here: a malformed address only
/// takes that one endpoint out of the registry.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.endpoints.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one endpoint must be configured".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some(endpoint) = config.endpoints.iter().find(|e| e.timeout_secs == 0) {
        return Err(ConfigError::ValidationError(format!(
            "endpoints.timeout_secs cannot be 0 (endpoint {})",
            endpoint.url
        )));
    }

    if config.liveness.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "liveness.interval_secs cannot be 0".to_string(),
        ));
    }

    if config.liveness.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "liveness.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
