//! Client-visible gateway errors.
//!
//! Every request-path failure maps to a distinct status and a JSON body of
//! the form `{"error":{"code":"...","message":"..."}}`.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::Service;
use crate::security::jwt::AuthError;
use crate::security::rate_limit::RateLimitScope;

/// Gateway-level errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("{scope} rate limit exceeded")]
    RateLimited {
        scope: RateLimitScope,
        retry_after: Duration,
    },

    #[error("origin {0:?} is not allowed")]
    OriginNotAllowed(String),

    #[error("service '{0}' is not configured")]
    ServiceNotConfigured(Service),

    #[error("upstream request to '{0}' failed")]
    BadGateway(Service),

    #[error("no route for this path")]
    NotFound,

    #[error("internal gateway error")]
    Internal,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::Unauthorized(AuthError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "AUTH_NOT_CONFIGURED")
            }
            GatewayError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            GatewayError::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
            }
            GatewayError::OriginNotAllowed(_) => (StatusCode::FORBIDDEN, "ORIGIN_NOT_ALLOWED"),
            GatewayError::ServiceNotConfigured(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_NOT_CONFIGURED")
            }
            GatewayError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY"),
            GatewayError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            GatewayError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        let mut response = (status, body).into_response();

        match &self {
            GatewayError::Unauthorized(e) if !matches!(e, AuthError::NotConfigured) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            GatewayError::RateLimited { retry_after, .. } => {
                // Whole seconds, rounded up.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
            }
            _ => {}
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses_are_distinct_per_kind() {
        let cases = [
            (GatewayError::Unauthorized(AuthError::MissingToken), StatusCode::UNAUTHORIZED),
            (
                GatewayError::Unauthorized(AuthError::NotConfigured),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::RateLimited {
                    scope: RateLimitScope::Ip,
                    retry_after: Duration::from_millis(1500),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (GatewayError::OriginNotAllowed("http://c.com".into()), StatusCode::FORBIDDEN),
            (
                GatewayError::ServiceNotConfigured(Service::Production),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (GatewayError::BadGateway(Service::Sales), StatusCode::BAD_GATEWAY),
            (GatewayError::NotFound, StatusCode::NOT_FOUND),
            (GatewayError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let response = GatewayError::RateLimited {
            scope: RateLimitScope::User,
            retry_after: Duration::from_millis(1500),
        }
        .into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = GatewayError::Unauthorized(AuthError::TokenExpired).into_response();
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
