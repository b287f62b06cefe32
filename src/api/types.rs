//! API request and response types, shared by the daemon and the client.

use serde::{Deserialize, Serialize};

use crate::storage::Secret;

/// Body of `POST /api/secrets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSecretRequest {
    pub key: String,

    /// Sealed envelope, never plaintext
    pub value: String,

    pub project: String,

    pub environment: String,
}

/// Query of `GET /api/secrets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsQuery {
    pub project: Option<String>,
    pub environment: Option<String>,
}

/// One element of the `GET /api/secrets` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEntry {
    pub key: String,
    pub value: String,
    pub project: String,
    pub environment: String,
    pub updated_at: String,
}

impl From<Secret> for SecretEntry {
    fn from(secret: Secret) -> Self {
        Self {
            key: secret.key,
            value: secret.value,
            project: secret.project,
            environment: secret.environment,
            updated_at: secret.updated_at,
        }
    }
}

/// `{"status": "..."}` body for writes and health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// `{"error": "..."}` body for every failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
