//! HTTP API for the hush daemon.
//!
//! ## Endpoints
//!
//! - `POST /api/secrets` - Create or replace a sealed secret
//! - `GET /api/secrets?project=..&environment=..` - List sealed secrets
//! - `GET /api/projects` - List project names
//! - `GET /health` - Health check (unauthenticated)
//!
//! Everything under `/api` requires `Authorization: Bearer <token>`.

mod auth;
mod routes;
mod secrets;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
