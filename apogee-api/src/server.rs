//! HTTP server lifecycle.
//!
//! The server drains in-flight requests on shutdown, then tells background
//! jobs to stop.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::{ApiError, ApiResult};

/// Serve `app` until `signal` resolves, then flip `jobs_shutdown` to `true`.
///
/// Jobs are notified whether the server stopped gracefully or failed.
pub async fn serve_until<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    jobs_shutdown: watch::Sender<bool>,
) -> ApiResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await;

    match jobs_shutdown.send(true) {
        Ok(()) => tracing::info!("Background jobs notified of shutdown"),
        Err(e) => tracing::debug!(error = %e, "No background job left to notify"),
    }

    served.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
