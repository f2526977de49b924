//! Liveness and readiness endpoints
//!
//! GET /health - liveness probe (process is up)
//! GET /ready  - readiness probe (every configured backend reachable)

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::config::Service;
use crate::health::probe::ReadinessProbe;

/// GET /health - always 200 while the process is alive.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// GET /ready - 503 with the unreachable services when any backend is down.
pub async fn ready(State(probe): State<Arc<ReadinessProbe>>) -> impl IntoResponse {
    let unreachable = probe.unreachable().await;
    if unreachable.is_empty() {
        return (StatusCode::OK, Json(json!({ "status": "ready" })));
    }

    let names: Vec<&str> = unreachable.iter().copied().map(Service::slug).collect();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "not_ready", "unreachable": names })),
    )
}

/// Build the health router sub-tree
pub fn health_router(probe: Arc<ReadinessProbe>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(probe)
}
