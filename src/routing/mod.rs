//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     ServiceTable
//!     → upstream.rs (parse each address into an Upstream)
//!     → router.rs (one /api/<service> group per service, policy-wrapped)
//!     → Freeze as immutable axum Router
//!
//! Incoming Request (path):
//!     → /health, /ready           (no policy stages)
//!     → /api/<service>[/...]      (policy stages → proxy dispatch)
//!     → anything else             (404 JSON)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Every service gets routes even when unconfigured, so callers see 503
//!   rather than 404 for a known service
//! - Prefix matching only, on whole path segments

pub mod router;
pub mod upstream;

pub use router::register_routes;
pub use upstream::{Upstream, UpstreamError, UpstreamTable};
