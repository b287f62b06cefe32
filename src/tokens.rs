//! Bearer token issuance and validation.
//!
//! The raw token value is only returned once at creation time. The database
//! stores a SHA-256 digest so that a leaked database file does not expose
//! usable credentials. Validation is a plain membership test on the digest:
//! any valid token may access every project.

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{SqliteStore, StorageError};

/// Name under which the bootstrap token is recorded.
pub const ADMIN_TOKEN_NAME: &str = "admin";

const TOKEN_PREFIX: &str = "hush_";

#[derive(Debug, Error)]
pub enum TokenError {
    /// A token with this name exists; its raw value cannot be recovered.
    #[error("token '{0}' was already issued")]
    AlreadyIssued(String),

    #[error("token name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for TokenError {
    fn from(e: StorageError) -> Self {
        TokenError::Storage(e)
    }
}

#[derive(Debug, Clone)]
pub struct TokenAuthority {
    store: SqliteStore,
}

impl TokenAuthority {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Issue the bootstrap admin token. Succeeds at most once per database.
    pub async fn issue_admin_token(&self) -> Result<String, TokenError> {
        self.issue(ADMIN_TOKEN_NAME).await
    }

    /// Issue a new named token and return its raw value.
    pub async fn issue(&self, name: &str) -> Result<String, TokenError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TokenError::EmptyName);
        }

        let raw_token = format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().as_simple());

        match self.store.insert_token(name, &hex_sha256(&raw_token)).await {
            Ok(()) => {
                tracing::info!(name, "Issued access token");
                Ok(raw_token)
            }
            Err(StorageError::Conflict(_)) => Err(TokenError::AlreadyIssued(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// True iff `token` was previously issued.
    pub async fn validate(&self, token: &str) -> Result<bool, TokenError> {
        if token.is_empty() {
            return Ok(false);
        }
        Ok(self.store.token_exists(&hex_sha256(token)).await?)
    }

    /// Whether bootstrap already happened.
    pub async fn has_tokens(&self) -> Result<bool, TokenError> {
        Ok(self.store.token_count().await? > 0)
    }
}

fn hex_sha256(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(SqliteStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_issued_token_validates() {
        let tokens = authority();
        assert!(!tokens.has_tokens().await.unwrap());

        let token = tokens.issue_admin_token().await.unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert!(tokens.validate(&token).await.unwrap());
        assert!(tokens.has_tokens().await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_token_issued_only_once() {
        let tokens = authority();
        let first = tokens.issue_admin_token().await.unwrap();

        assert!(matches!(
            tokens.issue_admin_token().await,
            Err(TokenError::AlreadyIssued(_))
        ));
        assert!(tokens.validate(&first).await.unwrap());
    }

    #[tokio::test]
    async fn test_mutated_tokens_are_rejected() {
        let tokens = authority();
        let token = tokens.issue_admin_token().await.unwrap();

        assert!(!tokens.validate("").await.unwrap());
        assert!(!tokens.validate(&token.to_uppercase()).await.unwrap());
        assert!(!tokens.validate(&format!("{} ", token)).await.unwrap());
        assert!(!tokens.validate(&token[..token.len() - 1]).await.unwrap());

        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            let mut mutated = bytes.to_vec();
            mutated[i] ^= 0x01;
            let mutated = String::from_utf8(mutated).unwrap();
            assert!(!tokens.validate(&mutated).await.unwrap(), "byte {}", i);
        }
    }

    #[tokio::test]
    async fn test_named_tokens_are_independent() {
        let tokens = authority();
        let admin = tokens.issue_admin_token().await.unwrap();
        let ci = tokens.issue("ci").await.unwrap();

        assert_ne!(admin, ci);
        assert!(tokens.validate(&ci).await.unwrap());
        assert!(matches!(tokens.issue("  ").await, Err(TokenError::EmptyName)));
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let digest = hex_sha256("hush_abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hex_sha256("hush_abc"));
        assert_ne!(digest, hex_sha256("hush_abd"));
    }
}
