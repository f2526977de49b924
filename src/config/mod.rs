//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (+ optional .env file)
//!     → env.rs (GATEWAY_* lookup, typed defaulting)
//!     → schema.rs / services.rs (typed sections)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults; malformed values fall back silently
//! - Validation separates syntactic (accessor) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod services;
pub mod validation;

pub use env::{EnvReader, EnvSource, ProcessEnv};
pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, AuthMode, CorsConfig, GatewayConfig, LogFormat, ObservabilityConfig,
    RateLimitConfig, ServerConfig,
};
pub use services::{Service, ServiceTable};
