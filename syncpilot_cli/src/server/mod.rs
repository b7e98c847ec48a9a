//! Orchestrator HTTP server
//!
//! Serves the operator surface over a shared [`SyncController`]. Startup runs
//! the reconciliation pass; shutdown stops every monitor after the listener
//! has drained.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use router::create_router;
pub use state::AppState;

use anyhow::{Context, Result};
use log::{info, warn};
use std::future::Future;
use syncpilot_core::SyncController;
use tokio::net::TcpListener;

/// Orchestrator server
pub struct Server {
    controller: SyncController,
    listen_addr: String,
}

impl Server {
    pub fn new(controller: SyncController, listen_addr: impl Into<String>) -> Self {
        Self {
            controller,
            listen_addr: listen_addr.into(),
        }
    }

    /// Run until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.listen_addr))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let report = self.controller.reconcile().await;
        if !report.unreachable.is_empty() {
            warn!(
                "Instances unreachable at startup: {}",
                report
                    .unreachable
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let app = create_router(AppState::new(self.controller.clone()));
        let addr = listener.local_addr().context("Listener has no address")?;
        info!("syncpilot listening on http://{addr}");

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed");

        info!("syncpilot shutting down");
        self.controller.shutdown().await;
        served
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
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
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received terminate signal, initiating graceful shutdown"),
    }
}
