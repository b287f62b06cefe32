//! Router construction and server lifecycle.

use std::sync::Arc;

use axum::{
    middleware,
    response::Json,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::storage::SqliteStore;
use crate::tokens::TokenAuthority;

use super::auth;
use super::secrets;
use super::types::StatusResponse;

/// Shared application state. Built once, handed to every handler.
pub struct AppState {
    /// Secret store
    pub store: SqliteStore,
    /// Bearer token set
    pub tokens: TokenAuthority,
}

impl AppState {
    pub fn new(store: SqliteStore) -> Self {
        let tokens = TokenAuthority::new(store.clone());
        Self { store, tokens }
    }
}

/// Build the full router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route(
            "/api/secrets",
            get(secrets::get_secrets).post(secrets::set_secret),
        )
        .route("/api/projects", get(secrets::list_projects))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store, bootstrap the admin token if needed, and serve until a
/// shutdown signal arrives.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db_path).await?;
    tracing::info!("Secret store opened at {}", config.db_path.display());

    let state = Arc::new(AppState::new(store));
    bootstrap_admin_token(&state.tokens).await?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Issue the admin token on first start and hand it to the operator.
///
/// The token goes to stdout, not the log, and is never shown again.
async fn bootstrap_admin_token(tokens: &TokenAuthority) -> anyhow::Result<()> {
    if tokens.has_tokens().await? {
        tracing::debug!("Token set already initialized");
        return Ok(());
    }

    let token = tokens.issue_admin_token().await?;
    println!("Admin token (shown once, store it now): {}", token);
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::new("healthy"))
}
