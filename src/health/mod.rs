//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health (handlers.rs):
//!     → 200 while the process is alive, no dependency checks
//!
//! GET /ready (handlers.rs):
//!     → probe.rs connects to every configured backend concurrently
//!     → 200 when all accept within the budget, 503 listing the rest
//! ```
//!
//! # Design Decisions
//! - Probes are on demand; no background state to go stale
//! - Unconfigured services are not probed
//! - Both endpoints sit outside the policy stack

pub mod handlers;
pub mod probe;

pub use handlers::health_router;
pub use probe::ReadinessProbe;
