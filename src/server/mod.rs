//! HTTP surface of the mirror
//!
//! - [`routes`] - Router construction and middleware
//! - [`handlers`] - Request handlers
//! - [`state`] - Shared handler state
//! - [`error`] - Error to status code mapping

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::errors::{AppError, Result};

pub use routes::create_router;
pub use state::AppState;

/// Bind `addr` and serve until Ctrl+C
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        AppError::generic(format!("failed to bind to {addr}: {e}"))
    })?;
    let local = listener.local_addr()?;
    tracing::info!("Listening on http://{}", local);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
