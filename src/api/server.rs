//! Status API server using Axum
//!
//! Exposes read-only views of the peer registry.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::ApiServerConfig;
use crate::error::{PeerlinkError, Result};
use crate::signal::PeerRegistry;

use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PeerRegistry>,
    pub started_at: Instant,
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, registry: Arc<PeerRegistry>) -> Self {
        let state = AppState {
            registry,
            started_at: Instant::now(),
        };

        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| PeerlinkError::Bind { addr, source })
    }

    /// Serve the API on an already bound listener until shutdown
    #[instrument(skip(self, listener, shutdown))]
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("API server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| PeerlinkError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
