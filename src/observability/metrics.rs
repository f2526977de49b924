//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): dispatched requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): dispatch latency by service
//! - `gateway_rate_limited_total` (counter): rejections by scope (`ip`, `user`)
//! - `gateway_auth_rejected_total` (counter): rejections by reason
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op, so tests need no setup
//! - Labels are low-cardinality: never user ids, paths or client addresses

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

/// Record a completed dispatch.
pub fn record_request(method: &str, status: u16, service: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service,
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("gateway_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_auth_rejected(reason: &'static str) {
    counter!("gateway_auth_rejected_total", "reason" => reason).increment(1);
}
