//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Per service group, outermost first (stack.rs):
//!     → rate_limit.rs (per-IP window)
//!     → auth.rs + jwt.rs (verify bearer token, attach identity;
//!                         preflights pass through)
//!     → rate_limit.rs (per-user window)
//!     → cors.rs (strict mode: reject disallowed origins)
//!     → cors.rs (answer preflight, decorate responses)
//!     → Pass to proxy
//!         → headers.rs (sanitize, add X-Forwarded-*, X-User-Id)
//! ```
//!
//! # Design Decisions
//! - Fail closed: any failed check short-circuits with a JSON error
//! - Client-supplied identity headers are never trusted
//! - Limiter state is in-memory and per-process

pub mod auth;
pub mod cors;
pub mod headers;
pub mod jwt;
pub mod rate_limit;
pub mod stack;

pub use auth::AuthStage;
pub use jwt::{AuthError, AuthenticatedUser, TokenVerifier};
pub use rate_limit::{RateLimitScope, RateLimiter};
pub use stack::PolicyStack;
