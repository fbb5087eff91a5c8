//! HTTP API for Sentiscope.
//!
//! ```text
//! axum router (CORS, tracing, /api mirror)
//!   ├─ handlers ── auth (argon2 + HS256 JWT, CurrentUser extractor)
//!   ├─ Arc<dyn SentimentBackend>   shared model handle
//!   └─ Arc<dyn Store>              PostgreSQL in production
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AuthConfig, ConfigError, ServerSettings};
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;

/// Bind `addr` and serve the API until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "sentiscope API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
