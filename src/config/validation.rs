//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (the env accessor handles syntax)
//! - Validate value ranges (port, timeouts, budgets > 0)
//! - Check that configured service addresses are usable upstreams
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::services::Service;
use crate::routing::upstream::Upstream;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("GATEWAY_PORT must not be 0")]
    ZeroPort,

    #[error("GATEWAY_{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("GATEWAY_{0} must be a positive integer")]
    ZeroRateLimit(&'static str),

    #[error("GATEWAY_RATE_LIMIT_WINDOW must be greater than zero")]
    ZeroWindow,

    #[error("GATEWAY_MAX_BODY_BYTES must be greater than zero")]
    ZeroBodyLimit,

    #[error("GATEWAY_{env} has an unusable address {address:?}: {reason}")]
    InvalidServiceAddress {
        env: &'static str,
        address: String,
        reason: String,
    },

    #[error("GATEWAY_METRICS_ADDR is not a socket address: {0:?}")]
    InvalidMetricsAddress(String),
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.server.read_timeout.is_zero() {
        errors.push(ValidationError::ZeroTimeout("READ_TIMEOUT"));
    }
    if config.server.write_timeout.is_zero() {
        errors.push(ValidationError::ZeroTimeout("WRITE_TIMEOUT"));
    }
    if config.server.ready_timeout.is_zero() {
        errors.push(ValidationError::ZeroTimeout("READY_TIMEOUT"));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.rate_limit.per_ip == 0 {
        errors.push(ValidationError::ZeroRateLimit("RATE_LIMIT_PER_IP"));
    }
    if config.rate_limit.per_user == 0 {
        errors.push(ValidationError::ZeroRateLimit("RATE_LIMIT_PER_USER"));
    }
    if config.rate_limit.window.is_zero() {
        errors.push(ValidationError::ZeroWindow);
    }

    for (service, address) in config.services.configured() {
        if let Err(e) = Upstream::parse(address) {
            errors.push(ValidationError::InvalidServiceAddress {
                env: Service::env_suffix(service),
                address: address.to_string(),
                reason: e.to_string(),
            });
        }
    }

    let metrics_address = &config.observability.metrics_address;
    if !metrics_address.is_empty() && metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
