//! HTTP client for the hush daemon.
//!
//! Every call is a single attempt: transport failures and non-2xx responses
//! surface immediately, tagged with the operation that failed. Retry policy
//! belongs to the caller.

pub mod batch;
pub mod output;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::types::{SecretEntry, SetSecretRequest};
use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{op}: request failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op}: unauthorized (check your token)")]
    Unauthorized { op: &'static str },

    #[error("{op}: server returned {status}: {body}")]
    Status {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{op}: malformed response: {message}")]
    Decode { op: &'static str, message: String },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ClientError::Status { status, .. } if *status == StatusCode::BAD_REQUEST => {
                ErrorKind::MalformedInput
            }
            ClientError::Status { status, .. } if status.is_server_error() => {
                ErrorKind::StorageFailure
            }
            _ => ErrorKind::Transport,
        }
    }
}

/// The remote operations batch push/pull depend on.
#[async_trait]
pub trait SecretsRemote: Send + Sync {
    async fn set_secret(
        &self,
        project: &str,
        environment: &str,
        key: &str,
        envelope: &str,
    ) -> Result<(), ClientError>;

    async fn get_secrets(
        &self,
        project: &str,
        environment: &str,
    ) -> Result<Vec<SecretEntry>, ClientError>;
}

#[derive(Clone)]
pub struct HushClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HushClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HushClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HushClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /api/projects
    pub async fn list_projects(&self) -> Result<Vec<String>, ClientError> {
        const OP: &str = "list projects";
        let resp = self
            .client
            .get(format!("{}/api/projects", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| ClientError::Transport { op: OP, source })?;

        decode_json(OP, resp).await
    }

    /// GET /health. Does not send the token.
    pub async fn ping(&self) -> Result<(), ClientError> {
        const OP: &str = "health check";
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|source| ClientError::Transport { op: OP, source })?;

        check_status(OP, resp).await.map(|_| ())
    }
}

#[async_trait]
impl SecretsRemote for HushClient {
    /// POST /api/secrets
    async fn set_secret(
        &self,
        project: &str,
        environment: &str,
        key: &str,
        envelope: &str,
    ) -> Result<(), ClientError> {
        const OP: &str = "push secret";
        let body = SetSecretRequest {
            key: key.to_string(),
            value: envelope.to_string(),
            project: project.to_string(),
            environment: environment.to_string(),
        };

        let resp = self
            .client
            .post(format!("{}/api/secrets", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|source| ClientError::Transport { op: OP, source })?;

        check_status(OP, resp).await.map(|_| ())
    }

    /// GET /api/secrets?project=..&environment=..
    async fn get_secrets(
        &self,
        project: &str,
        environment: &str,
    ) -> Result<Vec<SecretEntry>, ClientError> {
        const OP: &str = "fetch secrets";
        let url = format!(
            "{}/api/secrets?project={}&environment={}",
            self.base_url,
            urlencoding::encode(project),
            urlencoding::encode(environment)
        );

        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| ClientError::Transport { op: OP, source })?;

        decode_json(OP, resp).await
    }
}

async fn check_status(
    op: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized { op });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status { op, status, body })
}

async fn decode_json<T: DeserializeOwned>(
    op: &'static str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let resp = check_status(op, resp).await?;
    let text = resp
        .text()
        .await
        .map_err(|source| ClientError::Transport { op, source })?;
    serde_json::from_str(&text).map_err(|e| ClientError::Decode {
        op,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let client = HushClient::new("http://localhost:8080//", "hush_x");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn debug_hides_token() {
        let client = HushClient::new("http://localhost:8080", "hush_secret_token");
        assert!(!format!("{:?}", client).contains("hush_secret_token"));
    }

    #[test]
    fn error_messages_name_the_operation() {
        let err = ClientError::Status {
            op: "push secret",
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "storage failure".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("push secret:"));
        assert!(rendered.contains("500"));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(
            ClientError::Unauthorized { op: "fetch secrets" }.kind(),
            ErrorKind::Unauthorized
        );
    }
}
