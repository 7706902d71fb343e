//! Bearer token authentication for v1 routes.
//!
//! Protects all v1 routes except explicitly public ones like `/health`.
//! Tokens are validated against the `SIFT_API_KEYS` configuration; auth
//! errors are returned as the v1 `ApiResponse` JSON envelope.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;

use super::response::{ApiResponse, ErrorCode};

fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or("Missing authorization header")?;
    raw.strip_prefix("Bearer ")
        .ok_or("Invalid authorization header format. Expected: Bearer <token>")
}

/// Enforces `Authorization: Bearer <token>` on protected v1 routes.
///
/// - Empty/unset `SIFT_API_KEYS` locks all protected routes down with 401.
/// - Missing or malformed header, or an unknown token, is 401.
pub async fn v1_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let keys = &state.config.server.api_keys;
    if keys.is_empty() {
        return ApiResponse::<()>::error(
            ErrorCode::Unauthorized,
            "API keys not configured. Set SIFT_API_KEYS to enable access.",
        )
        .into_response();
    }

    match bearer_token(request.headers()) {
        Ok(token) if keys.iter().any(|k| k == token) => next.run(request).await,
        Ok(_) => {
            ApiResponse::<()>::error(ErrorCode::Unauthorized, "Invalid API key").into_response()
        }
        Err(message) => ApiResponse::<()>::error(ErrorCode::Unauthorized, message).into_response(),
    }
}
