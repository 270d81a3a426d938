// =============================================================================
// Admin Authentication
// =============================================================================
//
// One checked path guards both transports: REST requests carry
// `Authorization: Bearer <token>`, the WebSocket upgrade carries `?token=`.
// Both funnel into [`authorize`], which compares the credential against the
// `MERIDIAN_ADMIN_TOKEN` environment variable. The variable is read per
// request so rotating the token needs no restart, and the comparison does
// the same amount of work wherever the inputs diverge.
// =============================================================================

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Environment variable holding the admin token.
pub const ADMIN_TOKEN_VAR: &str = "MERIDIAN_ADMIN_TOKEN";

/// Why a credential was refused. Every variant renders as 403 so a caller
/// cannot tell which stage failed.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    NotConfigured,
    MissingCredentials,
    BadToken,
}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            Self::NotConfigured => "admin token not configured",
            Self::MissingCredentials => "authorization required",
            Self::BadToken => "invalid token",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message() });
        (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
    }
}

/// Check a presented credential against the configured admin token.
pub fn authorize(presented: Option<&str>) -> Result<(), AuthError> {
    let expected = std::env::var(ADMIN_TOKEN_VAR).unwrap_or_default();
    if expected.is_empty() {
        warn!("{ADMIN_TOKEN_VAR} is not set; refusing all admin requests");
        return Err(AuthError::NotConfigured);
    }
    let presented = presented.ok_or(AuthError::MissingCredentials)?;
    if !tokens_match(presented.as_bytes(), expected.as_bytes()) {
        warn!("admin token mismatch");
        return Err(AuthError::BadToken);
    }
    Ok(())
}

/// Pull the credential out of an `Authorization` header value.
fn bearer(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

/// Walks the longer of the two inputs no matter where they first differ,
/// folding length and content mismatches into a single flag.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    let mut diff = presented.len() ^ expected.len();
    for i in 0..presented.len().max(expected.len()) {
        let a = presented.get(i).copied().unwrap_or(0) as usize;
        let b = expected.get(i).copied().unwrap_or(0) as usize;
        diff |= a ^ b;
    }
    diff == 0
}

/// Marker extractor: a handler that takes `Admin` only runs for requests
/// whose Bearer credential passes [`authorize`].
pub struct Admin;

impl<S> FromRequestParts<S> for Admin
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer);
        authorize(credential)?;
        Ok(Admin)
    }
}
