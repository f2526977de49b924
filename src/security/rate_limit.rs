//! Per-IP and per-user rate limiting.
//!
//! Each limiter is a fixed-window counter keyed by client IP or user id,
//! held in a sharded `DashMap`. The entry lock serializes concurrent requests
//! from the same key without a process-wide lock.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::error::GatewayError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::security::jwt::AuthenticatedUser;

/// Which counter a rate-limit decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Ip,
    User,
}

impl RateLimitScope {
    pub fn label(self) -> &'static str {
        match self {
            RateLimitScope::Ip => "ip",
            RateLimitScope::User => "user",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitScope::Ip => f.write_str("per-IP"),
            RateLimitScope::User => f.write_str("per-user"),
        }
    }
}

/// Counter state for one key.
struct Window {
    /// Number of requests made in the current window
    count: u32,
    /// Start of the current window
    started: Instant,
}

/// Fixed-window rate limiter.
///
/// Each key gets `max_requests` requests per `window`. When the window
/// expires the counter resets.
pub struct RateLimiter {
    scope: RateLimitScope,
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(scope: RateLimitScope, max_requests: u32, window: Duration) -> Self {
        Self {
            scope,
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Count a request from `key`.
    ///
    /// Returns the time until the window resets when the budget is spent.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            started: now,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            Ok(())
        } else {
            Err(self.window.saturating_sub(elapsed))
        }
    }

    /// Drop windows that have expired, keeping memory bounded.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, state| now.saturating_duration_since(state.started) < self.window);
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    fn reject(&self, key: &str, retry_after: Duration) -> Response {
        tracing::warn!(scope = self.scope.label(), client = %key, "Rate limit exceeded");
        metrics::record_rate_limited(self.scope.label());
        GatewayError::RateLimited {
            scope: self.scope,
            retry_after,
        }
        .into_response()
    }
}

/// Source IP of the connection, as recorded by the listener.
pub fn client_ip(request: &Request<Body>) -> Option<std::net::IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Middleware: per-source-IP budget, applied before authentication.
pub async fn limit_by_ip(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_ip(&request).map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => limiter.reject(&key, retry_after),
    }
}

/// Middleware: per-user budget, applied after authentication.
///
/// Anonymous requests are not counted here.
pub async fn limit_by_user(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthenticatedUser>() else {
        return next.run(request).await;
    };
    let key = user.user_id.clone();

    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => limiter.reject(&key, retry_after),
    }
}

/// Periodically sweep expired windows until shutdown.
pub fn spawn_sweeper(
    limiters: Vec<Arc<RateLimiter>>,
    every: Duration,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for limiter in &limiters {
                        limiter.sweep();
                        tracing::debug!(
                            scope = limiter.scope.label(),
                            tracked = limiter.tracked_keys(),
                            "Swept expired rate limit windows"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    })
}
