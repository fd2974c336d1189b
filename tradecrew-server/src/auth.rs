//! Bearer-token guard for the `/memory` and `/jobs` routes.
//!
//! Tokens come from `auth.api_tokens`. With no tokens configured the guard lets
//! every request through (local development).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::http::HttpState;

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing bearer token",
            AuthError::InvalidToken => "Invalid bearer token",
        };
        let body = serde_json::json!({ "error": message, "status": "error" });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Compares every byte of equal-length inputs; only the length leaks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check an `Authorization` header value against the configured tokens.
pub fn check_authorization(header_value: Option<&str>, tokens: &[String]) -> Result<(), AuthError> {
    if tokens.is_empty() {
        return Ok(());
    }

    let provided = header_value
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    // No early exit: every configured token is compared.
    let matched = tokens
        .iter()
        .fold(false, |found, token| constant_time_eq(token, provided) | found);

    if matched {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

pub async fn require_bearer(
    State(state): State<Arc<HttpState>>,
    request: Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = check_authorization(header_value, &state.config.auth.api_tokens) {
        tracing::debug!(path = %request.uri().path(), error = ?e, "Rejected request");
        return e.into_response();
    }

    next.run(request).await
}
