//! Router, shared state and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use access_ddns_core::PolicyUpdater;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handler::{health, update_handler};

/// Shared state for handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    updater: Arc<PolicyUpdater>,
}

impl AppState {
    pub fn new(updater: PolicyUpdater) -> Self {
        Self {
            updater: Arc::new(updater),
        }
    }

    pub fn updater(&self) -> &PolicyUpdater {
        &self.updater
    }
}

/// `/health` (any method) for liveness; every other path and method runs an
/// update.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", any(health))
        .fallback(update_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C / SIGTERM.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "access-ddns listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("access-ddns stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
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
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
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

    info!("shutdown signal received");
}
