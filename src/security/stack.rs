//! Per-group policy composition.
//!
//! Every service group is wrapped in the same ordered stages:
//! IP limit → authentication → user limit → origin guard → CORS negotiation.
//! The limiters are shared across groups so budgets are per client, not per
//! service.

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::{GatewayConfig, Service};
use crate::security::auth::{authenticate, AuthStage};
use crate::security::cors::{cors_layer, enforce_origin, OriginGuard};
use crate::security::jwt::TokenVerifier;
use crate::security::rate_limit::{limit_by_ip, limit_by_user, RateLimitScope, RateLimiter};

/// Shared state for the policy stages.
#[derive(Clone)]
pub struct PolicyStack {
    ip_limiter: Arc<RateLimiter>,
    user_limiter: Arc<RateLimiter>,
    verifier: Arc<TokenVerifier>,
    origin_guard: OriginGuard,
    cors: CorsLayer,
}

impl PolicyStack {
    pub fn new(config: &GatewayConfig, verifier: Arc<TokenVerifier>) -> Self {
        let limits = &config.rate_limit;
        Self {
            ip_limiter: Arc::new(RateLimiter::new(
                RateLimitScope::Ip,
                limits.per_ip,
                limits.window,
            )),
            user_limiter: Arc::new(RateLimiter::new(
                RateLimitScope::User,
                limits.per_user,
                limits.window,
            )),
            verifier,
            origin_guard: OriginGuard::new(&config.cors),
            cors: cors_layer(&config.cors),
        }
    }

    /// Limiters whose expired windows need periodic sweeping.
    pub fn limiters(&self) -> Vec<Arc<RateLimiter>> {
        vec![self.ip_limiter.clone(), self.user_limiter.clone()]
    }

    /// Wrap the routes of `service` in the policy stages.
    ///
    /// The first layer added is the outermost.
    pub fn wrap(&self, service: Service, group: Router) -> Router {
        let auth = AuthStage::new(self.verifier.clone(), service.requires_token());
        group.layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(self.ip_limiter.clone(), limit_by_ip))
                .layer(from_fn_with_state(auth, authenticate))
                .layer(from_fn_with_state(self.user_limiter.clone(), limit_by_user))
                .layer(from_fn_with_state(self.origin_guard.clone(), enforce_origin))
                .layer(self.cors.clone()),
        )
    }
}
