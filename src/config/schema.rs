//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! Every section is populated from `GATEWAY_*` environment variables and every
//! field has a documented default, so building a [`GatewayConfig`] never fails.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::env::{EnvReader, EnvSource};
use crate::config::services::ServiceTable;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewayConfig {
    /// Listener and timeout settings.
    pub server: ServerConfig,

    /// Token verification material.
    pub auth: AuthConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Per-IP and per-user request budgets.
    pub rate_limit: RateLimitConfig,

    /// Backend service addresses.
    pub services: ServiceTable,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Build the configuration from an arbitrary environment source.
    pub fn from_source(source: &dyn EnvSource) -> Self {
        let env = EnvReader::new(source);
        Self {
            server: ServerConfig::from_reader(&env),
            auth: AuthConfig::from_reader(&env),
            cors: CorsConfig::from_reader(&env),
            rate_limit: RateLimitConfig::from_reader(&env),
            services: ServiceTable::from_reader(&env),
            observability: ObservabilityConfig::from_reader(&env),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Budget for reading a request body.
    #[serde(serialize_with = "serialize_duration")]
    pub read_timeout: Duration,

    /// Budget for producing a response.
    #[serde(serialize_with = "serialize_duration")]
    pub write_timeout: Duration,

    /// How long in-flight requests may drain after a shutdown signal.
    #[serde(serialize_with = "serialize_duration")]
    pub shutdown_timeout: Duration,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,

    /// Per-backend connect budget for the readiness probe.
    #[serde(serialize_with = "serialize_duration")]
    pub ready_timeout: Duration,
}

impl ServerConfig {
    fn from_reader(env: &EnvReader<'_>) -> Self {
        let defaults = Self::default();
        Self {
            host: env.string_value("HOST", &defaults.host),
            port: env.int_value("PORT", defaults.port),
            read_timeout: env.duration_value("READ_TIMEOUT", defaults.read_timeout),
            write_timeout: env.duration_value("WRITE_TIMEOUT", defaults.write_timeout),
            shutdown_timeout: env.duration_value("SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            max_body_bytes: env.int_value("MAX_BODY_BYTES", defaults.max_body_bytes),
            ready_timeout: env.duration_value("READY_TIMEOUT", defaults.ready_timeout),
        }
    }

    /// `host:port` string handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(15),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            ready_timeout: Duration::from_secs(2),
        }
    }
}

/// Active token verification mode.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// HS256 with a secret shared with the authentication service.
    Secret(String),
    /// RS256 with a public key, given as PEM text or a path to a PEM file.
    PublicKey(String),
    /// No verification material; protected routes cannot be served.
    #[default]
    Unconfigured,
}

impl AuthMode {
    /// Resolve the mode from raw material. The public key takes precedence.
    pub fn resolve(secret: &str, public_key: &str) -> Self {
        if !public_key.is_empty() {
            AuthMode::PublicKey(public_key.to_string())
        } else if !secret.is_empty() {
            AuthMode::Secret(secret.to_string())
        } else {
            AuthMode::Unconfigured
        }
    }

    /// Short algorithm label for logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::Secret(_) => "hs256",
            AuthMode::PublicKey(_) => "rs256",
            AuthMode::Unconfigured => "unconfigured",
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Secret(_) => f.write_str("Secret(<redacted>)"),
            AuthMode::PublicKey(_) => f.write_str("PublicKey(..)"),
            AuthMode::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}

impl Serialize for AuthMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Token verification configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthConfig {
    /// Mode selected at load time.
    pub mode: AuthMode,

    /// A shared secret was provided but ignored because a public key is set.
    pub secret_shadowed: bool,

    /// Required `aud` claim; tokens are not checked for one when unset.
    pub audience: Option<String>,
}

impl AuthConfig {
    fn from_reader(env: &EnvReader<'_>) -> Self {
        let secret = env.string_value("JWT_SECRET", "");
        let public_key = env.string_value("JWT_PUBLIC_KEY", "");
        let audience = env.string_value("JWT_AUDIENCE", "");
        Self {
            secret_shadowed: !secret.is_empty() && !public_key.is_empty(),
            mode: AuthMode::resolve(&secret, &public_key),
            audience: (!audience.is_empty()).then_some(audience),
        }
    }
}

/// Cross-origin request policy.
#[derive(Debug, Clone, Serialize)]
pub struct CorsConfig {
    /// Allowed origins, de-duplicated, in first-seen order.
    pub origins: Vec<String>,

    /// Reject disallowed origins outright instead of omitting CORS headers.
    pub strict: bool,
}

impl CorsConfig {
    fn from_reader(env: &EnvReader<'_>) -> Self {
        Self {
            origins: parse_origins(&env.string_value("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)),
            strict: env.bool_value("CORS_STRICT", false),
        }
    }

    /// Whether every origin is allowed (`*` entry).
    pub fn allows_any(&self) -> bool {
        self.origins.iter().any(|origin| origin == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: parse_origins(DEFAULT_CORS_ORIGINS),
            strict: false,
        }
    }
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";

/// Split a comma-delimited origin list, dropping blanks and duplicates.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter(|origin| seen.insert(origin.to_string()))
        .map(str::to_string)
        .collect()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window from one source IP.
    pub per_ip: u32,

    /// Maximum requests per window from one authenticated user.
    pub per_user: u32,

    /// Counting window.
    #[serde(serialize_with = "serialize_duration")]
    pub window: Duration,
}

impl RateLimitConfig {
    fn from_reader(env: &EnvReader<'_>) -> Self {
        let defaults = Self::default();
        Self {
            per_ip: env.int_value("RATE_LIMIT_PER_IP", defaults.per_ip),
            per_user: env.int_value("RATE_LIMIT_PER_USER", defaults.per_user),
            window: env.duration_value("RATE_LIMIT_WINDOW", defaults.window),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_ip: 100,
            per_user: 200,
            window: Duration::from_secs(60),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus scrape endpoint bind address; empty disables metrics.
    pub metrics_address: String,
}

impl LogFormat {
    /// Read `GATEWAY_LOG_FORMAT` on its own, before logging is set up.
    pub fn from_source(source: &dyn EnvSource) -> Self {
        Self::from_reader(&EnvReader::new(source))
    }

    fn from_reader(env: &EnvReader<'_>) -> Self {
        match env.string_value("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

impl ObservabilityConfig {
    fn from_reader(env: &EnvReader<'_>) -> Self {
        Self {
            log_format: LogFormat::from_reader(env),
            metrics_address: env.string_value("METRICS_ADDR", ""),
        }
    }
}

fn serialize_duration<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:?}"))
}
