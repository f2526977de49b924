//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, transport layers, graceful drain)
//!     → [routing + security decide the service group]
//!     → proxy.rs (rewrite URI and headers, forward, relay response)
//!     → Send to client
//! ```

pub mod proxy;
pub mod server;

pub use proxy::{upstream_client, ServiceRoute, UpstreamClient};
pub use server::HttpServer;
