//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with health, service and fallback routes
//! - Wire up transport middleware (request ID, tracing, panic recovery,
//!   timeouts, body limit)
//! - Bind the router to a listener with peer address info
//! - Drain in-flight requests on shutdown, bounded by the shutdown budget

use std::any::Any;
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::health::{health_router, ReadinessProbe};
use crate::http::proxy::upstream_client;
use crate::lifecycle::ShutdownSignal;
use crate::routing::register_routes;
use crate::routing::upstream::{ResolveError, UpstreamTable};
use crate::security::rate_limit::{spawn_sweeper, RateLimiter};
use crate::security::{PolicyStack, TokenVerifier};

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    limiters: Vec<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, verifier: Arc<TokenVerifier>) -> Result<Self, ResolveError> {
        let upstreams = UpstreamTable::resolve(&config.services)?;
        let stack = PolicyStack::new(&config, verifier);
        let probe = Arc::new(ReadinessProbe::new(&upstreams, config.server.ready_timeout));

        let router = Self::build_router(&config, &stack, &upstreams, probe);
        Ok(Self {
            router,
            limiters: stack.limiters(),
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &GatewayConfig,
        stack: &PolicyStack,
        upstreams: &UpstreamTable,
        probe: Arc<ReadinessProbe>,
    ) -> Router {
        let api = register_routes(Router::new(), stack, upstreams, upstream_client());
        Self::with_transport_layers(config, health_router(probe).merge(api))
    }

    /// Wrap `router` in the transport layers shared by every route.
    ///
    /// The body limit sits outside the 408 timeout; the timeout builds its
    /// response from `Body::default()`.
    #[allow(deprecated)]
    fn with_transport_layers(config: &GatewayConfig, router: Router) -> Router {
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
                .layer(TimeoutLayer::new(config.server.write_timeout))
                .layer(RequestBodyTimeoutLayer::new(config.server.read_timeout)),
        )
    }

    /// The fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    ///
    /// In-flight requests get `shutdown_timeout` to finish; whatever is left
    /// after that is aborted.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let window = self.config.rate_limit.window;
        let sweeper = spawn_sweeper(self.limiters, window, shutdown.clone());
        let mut drain_signal = shutdown.clone();
        let budget = self.config.server.shutdown_timeout;

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining in-flight requests");
        });
        let mut server = tokio::spawn(server.into_future());

        let finished = tokio::select! {
            result = &mut server => Some(result),
            _ = drain_signal.recv() => None,
        };
        let result = match finished {
            Some(result) => result,
            None => match tokio::time::timeout(budget, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        budget = ?budget,
                        "Drain budget exceeded, aborting remaining requests"
                    );
                    server.abort();
                    Ok(Ok(()))
                }
            },
        };
        sweeper.abort();

        result.map_err(io::Error::other)??;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Turn a handler panic into a JSON 500.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "Request handler panicked");
    GatewayError::Internal.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Service;
    use crate::security::jwt::test_tokens;
    use std::time::Duration;
    use axum::{
        extract::ConnectInfo,
        http::{header, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    fn server(config: GatewayConfig) -> HttpServer {
        let verifier = Arc::new(TokenVerifier::hs256(test_tokens::SECRET).unwrap());
        HttpServer::new(config, verifier).unwrap()
    }

    fn request(path: &str) -> axum::http::request::Builder {
        Request::builder().uri(path)
    }

    fn from_peer(mut request: Request<Body>, ip: [u8; 4]) -> Request<Body> {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 50000))));
        request
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_bypasses_policy_stack() {
        let mut config = GatewayConfig::default();
        config.rate_limit.per_ip = 1;
        let app = server(config).router();

        for _ in 0..3 {
            let req = from_peer(request("/health").body(Body::empty()).unwrap(), [10, 0, 0, 9]);
            let response = app.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("x-request-id"));
            assert_eq!(json_body(response).await, serde_json::json!({ "status": "ok" }));
        }
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = server(GatewayConfig::default()).router();
        let req = request("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_unconfigured_service_with_valid_token_is_unavailable() {
        let app = server(GatewayConfig::default()).router();
        let token = test_tokens::hs256(test_tokens::user_claims("grower-1"));
        let req = request("/api/production/harvests")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(from_peer(req, [10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"]["code"], "SERVICE_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_service_routes_require_token() {
        let app = server(GatewayConfig::default()).router();
        let req = request("/api/sales").body(Body::empty()).unwrap();
        let response = app.oneshot(from_peer(req, [10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_not_found() {
        let app = server(GatewayConfig::default()).router();
        for path in ["/", "/api", "/api/greenhouse/x", "/production/harvests"] {
            let req = request(path).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(from_peer(req, [10, 0, 0, 1])).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path}");
            assert_eq!(json_body(response).await["error"]["code"], "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn test_third_request_from_same_ip_is_limited() {
        let mut config = GatewayConfig::default();
        config.rate_limit.per_ip = 2;
        let app = server(config).router();

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let req = request("/api/auth/login").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(from_peer(req, [172, 16, 0, 4])).await.unwrap();
            statuses.push(response.status());
        }
        // The auth service is unconfigured, so passing requests end in 503.
        assert_eq!(
            statuses,
            [
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::TOO_MANY_REQUESTS
            ]
        );
    }

    #[tokio::test]
    async fn test_disallowed_origin_gets_no_allow_header() {
        let mut config = GatewayConfig::default();
        config.cors.origins = vec!["http://a.com".into(), "http://b.com".into()];
        let app = server(config).router();

        for origin in ["http://a.com", "http://c.com"] {
            let req = request("/api/auth/login")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(from_peer(req, [10, 0, 0, 2])).await.unwrap();
            let allow = response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN);
            if origin == "http://a.com" {
                assert_eq!(allow.unwrap(), "http://a.com");
            } else {
                assert!(allow.map_or(true, |value| value != origin));
            }
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = GatewayConfig::default();
        config.server.max_body_bytes = 16;
        config.services.set(Service::Auth, "127.0.0.1:1");
        let app = server(config).router();

        let req = request("/api/auth/login")
            .method("POST")
            .header(header::CONTENT_LENGTH, "64")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = app.oneshot(from_peer(req, [10, 0, 0, 3])).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    async fn explode() -> &'static str {
        panic!("handler failed")
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_json_error() {
        let router = Router::new().route("/explode", get(explode));
        let app = HttpServer::with_transport_layers(&GatewayConfig::default(), router);

        let response = app.oneshot(request("/explode").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["error"]["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        async fn stall() -> &'static str {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }
        let mut config = GatewayConfig::default();
        config.server.write_timeout = Duration::from_millis(50);
        let router = Router::new().route("/stall", get(stall));
        let app = HttpServer::with_transport_layers(&config, router);

        let response = app.oneshot(request("/stall").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
