// =============================================================================
// Bearer Token Authentication: Axum extractor
// =============================================================================
//
// Write endpoints take `AuthBearer` as an argument. The expected token comes
// from `METAL_PULSE_ADMIN_TOKEN`, read once at startup into `AppState`.
// Comparison is constant time.
//
//   async fn handler(_auth: AuthBearer, State(state): State<Arc<AppState>>) { ... }
//
// A missing, malformed or wrong token short-circuits with 403 before the
// handler body runs.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app_state::AppState;

/// Compare two byte slices without exiting early on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Validated bearer token.
pub struct AuthBearer(pub String);

pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

fn reject(message: &'static str) -> AuthRejection {
    AuthRejection {
        status: StatusCode::FORBIDDEN,
        message,
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthBearer {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token() else {
            warn!("METAL_PULSE_ADMIN_TOKEN is not set, rejecting authenticated request");
            return Err(reject("Server authentication not configured"));
        };

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let Some(token) = bearer_token(header) else {
            warn!(path = %parts.uri.path(), "missing or malformed Authorization header");
            return Err(reject("Missing or invalid authorization token"));
        };

        if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
            warn!(path = %parts.uri.path(), "invalid admin token presented");
            return Err(reject("Invalid authorization token"));
        }

        Ok(AuthBearer(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_cases() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer_string"));
        assert!(constant_time_eq(b"", b""));
        assert!(!constant_time_eq(b"\x00", b"\x01"));
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }
}
