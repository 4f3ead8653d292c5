//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::ColloquyConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<ColloquyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ColloquyConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ColloquyConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.engine.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "engine.endpoint must not be empty".to_string(),
        ));
    }

    if config.engine.model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "engine.model must not be empty".to_string(),
        ));
    }

    if config.runtime.max_tool_rounds == 0 {
        return Err(ConfigError::Invalid(
            "runtime.max_tool_rounds must be > 0".to_string(),
        ));
    }

    match config.stores.backend.trim() {
        "sqlite" | "memory" => {}
        other => {
            return Err(ConfigError::Invalid(format!(
                "stores.backend '{}' not supported (expected sqlite or memory)",
                other
            )));
        }
    }

    if config.stores.backend.trim() == "sqlite" && config.stores.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "stores.database_url must not be empty for the sqlite backend".to_string(),
        ));
    }

    Ok(())
}
