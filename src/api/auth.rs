//! Bearer-token gate for the `/api` routes.
//!
//! - Every protected request carries `Authorization: Bearer <token>`
//! - The token is checked against the issued set on each request
//! - Nothing is cached; a token is valid for as long as its row exists

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::routes::AppState;
use super::secrets::ApiError;

/// Extract the bearer token from an `Authorization` header value.
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let Some(token) = bearer_token(auth_header) else {
        return ApiError::new(StatusCode::UNAUTHORIZED, "Missing Authorization header")
            .into_response();
    };

    match state.tokens.validate(token).await {
        Ok(true) => next.run(req).await,
        Ok(false) => ApiError::new(StatusCode::UNAUTHORIZED, "Invalid token").into_response(),
        Err(e) => {
            tracing::error!("Token validation failed: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
        }
    }
}
