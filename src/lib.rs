//! Greenhouse edge gateway library.
//!
//! A single entry point in front of the greenhouse backend services: it
//! authenticates bearer tokens, rate limits per IP and per user, applies the
//! CORS policy and proxies `/api/<service>/...` to the configured backend.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
