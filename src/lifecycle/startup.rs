//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the token verifier from the resolved auth mode
//! - Report misconfiguration that degrades but does not prevent serving
//! - Assemble the HTTP server
//!
//! # Design Decisions
//! - Fail fast: unusable key material or upstream addresses are fatal
//! - Listeners are bound by the caller, after everything else succeeded

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{AuthMode, GatewayConfig, Service};
use crate::http::HttpServer;
use crate::routing::upstream::ResolveError;
use crate::security::jwt::{AuthError, TokenVerifier, MIN_SECRET_LEN};

/// Error that prevents the gateway from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot set up token verification: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upstream(#[from] ResolveError),
}

/// Configuration that is accepted but worth an operator's attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupWarning {
    SecretShadowed,
    ShortSecret { len: usize },
    AuthUnconfigured,
    ServicesUnconfigured(Vec<Service>),
}

impl fmt::Display for StartupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupWarning::SecretShadowed => {
                f.write_str("GATEWAY_JWT_SECRET is ignored because GATEWAY_JWT_PUBLIC_KEY is set")
            }
            StartupWarning::ShortSecret { len } => write!(
                f,
                "GATEWAY_JWT_SECRET is {len} bytes, shorter than the recommended {MIN_SECRET_LEN}"
            ),
            StartupWarning::AuthUnconfigured => f.write_str(
                "no JWT secret or public key configured, protected routes will answer 503",
            ),
            StartupWarning::ServicesUnconfigured(services) => {
                let names: Vec<&str> = services.iter().copied().map(Service::slug).collect();
                write!(f, "services without an address will answer 503: {}", names.join(", "))
            }
        }
    }
}

/// Collect the non-fatal problems in `config`.
pub fn startup_warnings(config: &GatewayConfig) -> Vec<StartupWarning> {
    let mut warnings = Vec::new();

    if config.auth.secret_shadowed {
        warnings.push(StartupWarning::SecretShadowed);
    }
    match &config.auth.mode {
        AuthMode::Secret(secret) if secret.len() < MIN_SECRET_LEN => {
            warnings.push(StartupWarning::ShortSecret { len: secret.len() });
        }
        AuthMode::Unconfigured => warnings.push(StartupWarning::AuthUnconfigured),
        _ => {}
    }

    let missing: Vec<Service> = Service::ALL
        .into_iter()
        .filter(|service| config.services.address(*service).is_none())
        .collect();
    if !missing.is_empty() {
        warnings.push(StartupWarning::ServicesUnconfigured(missing));
    }

    warnings
}

/// Build everything the server needs from a validated configuration.
pub fn prepare(config: GatewayConfig) -> Result<HttpServer, StartupError> {
    let verifier = Arc::new(TokenVerifier::from_config(&config.auth)?);

    tracing::info!(
        bind_address = %config.server.bind_address(),
        auth_mode = config.auth.mode.label(),
        jwt_audience = config.auth.audience.as_deref().unwrap_or("-"),
        services = config.services.configured().count(),
        cors_origins = %config.cors.origins.join(","),
        cors_strict = config.cors.strict,
        rate_limit_per_ip = config.rate_limit.per_ip,
        rate_limit_per_user = config.rate_limit.per_user,
        rate_limit_window = ?config.rate_limit.window,
        "Configuration loaded"
    );
    for warning in startup_warnings(&config) {
        tracing::warn!("{warning}");
    }

    Ok(HttpServer::new(config, verifier)?)
}
