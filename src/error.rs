//! Top-level error type and the user-facing error taxonomy.

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::crypto::{EnvelopeError, KeyError};
use crate::storage::StorageError;
use crate::tokens::TokenError;

/// Coarse classification used for reporting and exit decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing local key or credentials: re-run setup.
    NotFound,
    /// Bad or missing token: re-authenticate.
    Unauthorized,
    /// Bad pair syntax or request body.
    MalformedInput,
    /// Envelope did not authenticate.
    DecryptionFailed,
    /// Storage engine error.
    StorageFailure,
    /// Network failure or unexpected server response.
    Transport,
    /// Anything else in local configuration.
    Config,
}

#[derive(Debug, Error)]
pub enum HushError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl HushError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HushError::Key(KeyError::NotFound(_)) => ErrorKind::NotFound,
            HushError::Key(_) => ErrorKind::Config,
            HushError::Envelope(EnvelopeError::DecryptionFailed) => ErrorKind::DecryptionFailed,
            HushError::Envelope(EnvelopeError::EncryptionFailed) => ErrorKind::Config,
            HushError::Storage(_) => ErrorKind::StorageFailure,
            HushError::Token(TokenError::Storage(_)) => ErrorKind::StorageFailure,
            HushError::Token(TokenError::AlreadyIssued(_)) => ErrorKind::Config,
            HushError::Token(TokenError::EmptyName) => ErrorKind::MalformedInput,
            HushError::Client(e) => e.kind(),
            HushError::Config(ConfigError::NotFound(_)) => ErrorKind::NotFound,
            HushError::Config(_) => ErrorKind::Config,
            HushError::MalformedInput(_) => ErrorKind::MalformedInput,
        }
    }
}
