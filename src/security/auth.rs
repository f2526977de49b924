//! Authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, verifies it with the shared
//! [`TokenVerifier`] and attaches [`AuthenticatedUser`] to the request for
//! later stages. Failures short-circuit before any later stage runs.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::jwt::{AuthError, TokenVerifier};

/// State for one route group's authentication stage.
#[derive(Clone)]
pub struct AuthStage {
    verifier: Arc<TokenVerifier>,
    token_required: bool,
}

impl AuthStage {
    pub fn new(verifier: Arc<TokenVerifier>, token_required: bool) -> Self {
        Self {
            verifier,
            token_required,
        }
    }
}

/// Bearer token from the `Authorization` header, if one is present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// CORS preflights carry no credentials and are answered by the CORS stage.
pub fn is_preflight(request: &Request<Body>) -> bool {
    request.method() == Method::OPTIONS
        && request.headers().contains_key(header::ORIGIN)
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

pub async fn authenticate(
    State(stage): State<AuthStage>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_preflight(&request) {
        return next.run(request).await;
    }

    let token = bearer_token(request.headers()).map(str::to_owned);
    let result = match token {
        Some(token) => stage.verifier.verify(&token),
        None if !stage.token_required => return next.run(request).await,
        None if !stage.verifier.is_configured() => Err(AuthError::NotConfigured),
        None => Err(AuthError::MissingToken),
    };

    match result {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, "Request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Authentication rejected");
            metrics::record_auth_rejected(e.reason());
            GatewayError::Unauthorized(e).into_response()
        }
    }
}
