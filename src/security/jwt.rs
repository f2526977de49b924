//! JWT verification.
//!
//! Verifies bearer tokens locally with HS256 (secret shared with the
//! authentication service) or RS256 (public key), depending on the
//! configured [`AuthMode`]. No request is made to the authentication service.
//!
//! # Pre-conditions
//! - For HS256: the secret must be non-empty.
//! - For RS256: the key must be a PEM-encoded RSA public key, given inline or
//!   as a path to a file.
//!
//! # Post-conditions
//! - On success, returns the user identity from the `sub` claim (falling back
//!   to `user_id`).
//!
//! # Invariants
//! - Tokens must carry `exp`; expired tokens are rejected.
//! - Exactly one algorithm is accepted per verifier.
//! - `aud` is only checked when an audience is configured.

use std::path::PathBuf;

use axum::http::HeaderValue;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMode};

/// Shared secrets shorter than this are accepted but reported at startup.
pub const MIN_SECRET_LEN: usize = 32;

/// Claims the gateway reads from a token.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    user_id: Option<Value>,
}

/// Identity attached to a request after successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Error returned when authentication fails or cannot be set up.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid JWT signature")]
    InvalidSignature,

    #[error("JWT has expired")]
    TokenExpired,

    #[error("JWT is not valid yet")]
    TokenNotYetValid,

    #[error("malformed JWT")]
    MalformedToken,

    #[error("JWT is not signed with {0:?}")]
    UnexpectedAlgorithm(Algorithm),

    #[error("missing '{0}' claim in JWT")]
    MissingClaim(String),

    #[error("JWT '{0}' claim does not match")]
    ClaimMismatch(&'static str),

    #[error("JWT subject is not a usable user id")]
    InvalidSubject,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("cannot read public key file {path:?}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token verification is not configured")]
    NotConfigured,
}

impl AuthError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "expired",
            AuthError::TokenNotYetValid => "not_yet_valid",
            AuthError::MalformedToken => "malformed",
            AuthError::UnexpectedAlgorithm(_) => "algorithm",
            AuthError::MissingClaim(_)
            | AuthError::ClaimMismatch(_)
            | AuthError::InvalidSubject => "claims",
            AuthError::InvalidKey(_) | AuthError::KeyFile { .. } => "key",
            AuthError::NotConfigured => "not_configured",
        }
    }
}

/// Verifies tokens against the configured key material.
pub struct TokenVerifier {
    key: Option<VerifierKey>,
}

struct VerifierKey {
    key: DecodingKey,
    validation: Validation,
    algorithm: Algorithm,
}

impl VerifierKey {
    fn new(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        Self {
            key,
            validation,
            algorithm,
        }
    }
}

impl TokenVerifier {
    /// Build a verifier from the auth section of the configuration.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self::from_mode(&config.mode)?.with_audience(config.audience.as_deref()))
    }

    /// Build a verifier for the resolved auth mode.
    pub fn from_mode(mode: &AuthMode) -> Result<Self, AuthError> {
        match mode {
            AuthMode::Secret(secret) => Self::hs256(secret.as_bytes()),
            AuthMode::PublicKey(material) => Self::rs256_pem(&load_public_key(material)?),
            AuthMode::Unconfigured => Ok(Self::unconfigured()),
        }
    }

    /// HS256 verifier with a shared secret.
    pub fn hs256(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidKey("secret must be non-empty".to_string()));
        }
        let key = DecodingKey::from_secret(secret);
        Ok(Self {
            key: Some(VerifierKey::new(key, Algorithm::HS256)),
        })
    }

    /// RS256 verifier with a PEM-encoded RSA public key.
    pub fn rs256_pem(pem: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key: Some(VerifierKey::new(key, Algorithm::RS256)),
        })
    }

    /// Require tokens to name `audience` in their `aud` claim.
    pub fn with_audience(mut self, audience: Option<&str>) -> Self {
        if let (Some(verifier), Some(audience)) = (self.key.as_mut(), audience) {
            verifier.validation.set_audience(&[audience]);
        }
        self
    }

    /// A verifier that rejects every token.
    pub fn unconfigured() -> Self {
        Self { key: None }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// Verify `token` and extract the user identity.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let verifier = self.key.as_ref().ok_or(AuthError::NotConfigured)?;
        let data = decode::<Claims>(token, &verifier.key, &verifier.validation)
            .map_err(|e| map_jwt_error(e, verifier.algorithm))?;

        let user_id = subject(data.claims.sub)
            .or_else(|| subject(data.claims.user_id))
            .ok_or_else(|| AuthError::MissingClaim("sub".to_string()))?;
        if HeaderValue::from_str(&user_id).is_err() {
            return Err(AuthError::InvalidSubject);
        }
        Ok(AuthenticatedUser { user_id })
    }
}

/// Accept string or numeric identifiers; anything else counts as missing.
fn subject(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Inline PEM is used as-is (with `\n` escapes expanded); anything else is a path.
fn load_public_key(material: &str) -> Result<String, AuthError> {
    let trimmed = material.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(trimmed.replace("\\n", "\n"));
    }
    let path = PathBuf::from(trimmed);
    std::fs::read_to_string(&path).map_err(|source| AuthError::KeyFile { path, source })
}

fn map_jwt_error(error: jsonwebtoken::errors::Error, expected: Algorithm) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        ErrorKind::InvalidAlgorithm => AuthError::UnexpectedAlgorithm(expected),
        ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
        ErrorKind::InvalidAudience => AuthError::ClaimMismatch("aud"),
        ErrorKind::InvalidIssuer => AuthError::ClaimMismatch("iss"),
        _ => AuthError::MalformedToken,
    }
}
