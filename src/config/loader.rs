//! Configuration loading from the environment.

use thiserror::Error;

use crate::config::env::EnvSource;
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the configuration from `source` and validate it.
pub fn load_config(source: &dyn EnvSource) -> Result<GatewayConfig, ConfigError> {
    let config = GatewayConfig::from_source(source);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
