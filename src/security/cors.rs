//! Cross-origin request policy.
//!
//! # Responsibilities
//! - Build the tower-http `CorsLayer` from the allowed origin set
//! - Reject disallowed origins outright when strict mode is on
//!
//! # Design Decisions
//! - Allowed origins are reflected individually, never as `*`, so credentials work
//! - A `*` entry switches to any-origin without credentials
//! - Preflights are answered here and never reach a backend

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::error::GatewayError;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Build the header-negotiation layer for the allowed origins.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            X_REQUEST_ID,
        ])
        .expose_headers([X_REQUEST_ID])
        .max_age(Duration::from_secs(600));

    if config.allows_any() {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = config
        .origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(
                    origin = %origin,
                    "Ignoring CORS origin that is not a valid header value"
                );
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// State for the strict origin check.
#[derive(Clone)]
pub struct OriginGuard {
    allowed: Arc<HashSet<String>>,
    any: bool,
    strict: bool,
}

impl OriginGuard {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allowed: Arc::new(config.origins.iter().cloned().collect()),
            any: config.allows_any(),
            strict: config.strict,
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.any || self.allowed.contains(origin)
    }
}

/// Middleware: in strict mode, requests from disallowed origins get 403.
///
/// Requests without an `Origin` header are same-origin or non-browser and pass.
pub async fn enforce_origin(
    State(guard): State<OriginGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    match origin {
        Some(origin) if !guard.allows(&origin) => {
            if guard.strict {
                tracing::warn!(origin = %origin, "Rejected disallowed origin");
                return GatewayError::OriginNotAllowed(origin).into_response();
            }
            tracing::debug!(origin = %origin, "Origin not allowed, omitting CORS headers");
            next.run(request).await
        }
        _ => next.run(request).await,
    }
}
