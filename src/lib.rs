//! # hush
//!
//! A lightweight secrets manager. Values are sealed on the client under a
//! master key that never leaves the machine; the daemon stores only the
//! sealed envelopes, scoped by project and environment.
//!
//! ## Architecture
//!
//! ```text
//!   hush (client)                         hushd (daemon)
//! ┌──────────────────────┐  bearer token ┌──────────────────────┐
//! │ MasterKeyStore       │  HTTP + JSON  │ auth middleware      │
//! │ envelope::seal/open  │ ────────────▶ │   └─ TokenAuthority  │
//! │ HushClient + batch   │ ◀──────────── │ handlers             │
//! └──────────────────────┘   envelopes   │   └─ SqliteStore     │
//!                                        └──────────────────────┘
//! ```
//!
//! ## Modules
//! - `crypto`: master key file and AES-256-GCM envelopes
//! - `storage`: SQLite persistence for sealed secrets and token digests
//! - `tokens`: bearer token issuance and validation
//! - `api`: axum router, auth middleware and handlers
//! - `client`: HTTP client, batch push/pull, output writer
//! - `project`: `.hush` descriptor and credentials record
//! - `config`: daemon configuration from the environment

pub mod api;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod project;
pub mod storage;
pub mod tokens;
pub mod util;

pub use client::HushClient;
pub use config::ServerConfig;
pub use error::{ErrorKind, HushError};
pub use project::{Credentials, ProjectConfig};
pub use storage::SqliteStore;
pub use tokens::TokenAuthority;
