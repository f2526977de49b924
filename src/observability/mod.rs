//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for aggregation)
//!     → Prometheus scrape endpoint (when GATEWAY_METRICS_ADDR is set)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span (tower-http request-id layers)
//! - Metric updates are no-ops until a recorder is installed
//! - Secrets and token contents are never logged

pub mod logging;
pub mod metrics;
