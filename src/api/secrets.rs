//! Secret and project endpoints.
//!
//! Handlers are stateless: each validates its input and performs at most one
//! store operation.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::crypto::is_envelope;
use crate::storage::StorageError;

use super::routes::AppState;
use super::types::{ErrorResponse, SecretEntry, SecretsQuery, SetSecretRequest, StatusResponse};

/// An HTTP error rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        tracing::error!("Storage operation failed: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn require_field<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", name)));
    }
    Ok(trimmed)
}

/// POST /api/secrets
/// Create or replace one sealed secret.
pub async fn set_secret(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetSecretRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let project = require_field("project", &req.project)?;
    let environment = require_field("environment", &req.environment)?;
    let key = require_field("key", &req.key)?;
    if !is_envelope(&req.value) {
        return Err(ApiError::bad_request("value must be a sealed envelope"));
    }

    state.store.upsert(project, environment, key, &req.value).await?;

    tracing::debug!(project, environment, key, "Stored secret");
    Ok((StatusCode::CREATED, Json(StatusResponse::new("ok"))))
}

/// GET /api/secrets?project=..&environment=..
/// List sealed secrets for one project/environment pair.
pub async fn get_secrets(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SecretsQuery>, QueryRejection>,
) -> Result<Json<Vec<SecretEntry>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (project, environment) = match (query.project.as_deref(), query.environment.as_deref()) {
        (Some(p), Some(e)) if !p.trim().is_empty() && !e.trim().is_empty() => (p.trim(), e.trim()),
        _ => return Err(ApiError::bad_request("project and environment required")),
    };

    let secrets = state.store.fetch(project, environment).await?;
    Ok(Json(secrets.into_iter().map(SecretEntry::from).collect()))
}

/// GET /api/projects
/// Distinct project names with at least one stored secret.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_projects().await?))
}
