//! Upstream dispatch.
//!
//! # Responsibilities
//! - Map a service-group request to its backend URI
//! - Forward method, headers and streamed body over HTTP/1.1
//! - Return the backend response with hop-by-hop headers removed
//!
//! # Design Decisions
//! - No retries: non-idempotent requests are common and bodies are streamed
//! - Unconfigured services fail with 503 before any connection attempt
//! - Non-2xx backend statuses are passed through untouched

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Version},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::Service;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::routing::upstream::Upstream;
use crate::security::headers::{prepare_upstream_headers, strip_hop_by_hop};
use crate::security::jwt::AuthenticatedUser;
use crate::security::rate_limit::client_ip;

/// Pooled HTTP client shared by every service group.
pub type UpstreamClient = Client<HttpConnector, Body>;

pub fn upstream_client() -> UpstreamClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Dispatch state for one service group.
pub struct ServiceRoute {
    pub service: Service,
    /// Public path prefix, stripped before forwarding.
    pub prefix: String,
    pub upstream: Option<Arc<Upstream>>,
    pub client: UpstreamClient,
}

/// Forward the request to the group's backend.
pub async fn dispatch(State(route): State<Arc<ServiceRoute>>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let service = route.service;

    let Some(upstream) = route.upstream.as_deref() else {
        tracing::warn!(service = %service, "Request for unconfigured service");
        metrics::record_request(method.as_str(), 503, service.slug(), start);
        return GatewayError::ServiceNotConfigured(service).into_response();
    };

    let peer = client_ip(&request);
    let (mut parts, body) = request.into_parts();
    let rest = parts.uri.path().strip_prefix(route.prefix.as_str()).unwrap_or("");

    let uri = match upstream.uri_for(rest, parts.uri.query()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(service = %service, error = %e, "Cannot build backend URI");
            metrics::record_request(method.as_str(), 502, service.slug(), start);
            return GatewayError::BadGateway(service).into_response();
        }
    };

    let user = parts.extensions.get::<AuthenticatedUser>();
    prepare_upstream_headers(&mut parts.headers, peer, user);

    let mut outgoing = Request::new(body);
    *outgoing.method_mut() = parts.method;
    *outgoing.uri_mut() = uri;
    *outgoing.version_mut() = Version::HTTP_11;
    *outgoing.headers_mut() = parts.headers;

    tracing::debug!(
        service = %service,
        method = %method,
        upstream = %outgoing.uri(),
        "Forwarding request"
    );

    match route.client.request(outgoing).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            metrics::record_request(method.as_str(), parts.status.as_u16(), service.slug(), start);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(service = %service, error = %e, "Upstream request failed");
            metrics::record_request(method.as_str(), 502, service.slug(), start);
            GatewayError::BadGateway(service).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::any, Router};
    use tower::ServiceExt;

    fn app(upstream: Option<Upstream>) -> Router {
        let route = Arc::new(ServiceRoute {
            service: Service::Production,
            prefix: "/api/production".into(),
            upstream: upstream.map(Arc::new),
            client: upstream_client(),
        });
        Router::new()
            .route("/api/production/{*rest}", any(dispatch))
            .with_state(route)
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_service_is_unavailable() {
        let response = app(None).oneshot(get("/api/production/harvests")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "SERVICE_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let upstream = Upstream::parse(&addr.to_string()).unwrap();
        let response = app(Some(upstream)).oneshot(get("/api/production/x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
