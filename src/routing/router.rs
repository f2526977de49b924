//! Route table construction.
//!
//! # Responsibilities
//! - Register `/api/<service>` and `/api/<service>/{*rest}` for every service
//! - Wrap each service group in the policy stack
//! - Answer unknown paths with a JSON 404

use std::sync::Arc;

use axum::{response::IntoResponse, routing::any, Router};

use crate::config::Service;
use crate::error::GatewayError;
use crate::http::proxy::{dispatch, ServiceRoute, UpstreamClient};
use crate::routing::upstream::UpstreamTable;
use crate::security::PolicyStack;

/// Path prefix under which `service` is exposed.
pub fn service_prefix(service: Service) -> String {
    format!("/api/{}", service.slug())
}

/// Add the service routes and the fallback to `router`.
pub fn register_routes(
    router: Router,
    stack: &PolicyStack,
    upstreams: &UpstreamTable,
    client: UpstreamClient,
) -> Router {
    let mut router = router;
    for service in Service::ALL {
        let prefix = service_prefix(service);
        let route = Arc::new(ServiceRoute {
            service,
            prefix: prefix.clone(),
            upstream: upstreams.get(service),
            client: client.clone(),
        });

        let group = Router::new()
            .route(&prefix, any(dispatch))
            .route(&format!("{prefix}/{{*rest}}"), any(dispatch))
            .with_state(route);
        router = router.merge(stack.wrap(service, group));
    }

    router.fallback(not_found)
}

async fn not_found() -> impl IntoResponse {
    GatewayError::NotFound
}
