//! Peerlink Signalling Server - Entry Point
//!
//! Starts the signalling server and the status API with graceful shutdown support.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use peerlink::api::ApiServer;
use peerlink::config::LogConfig;
use peerlink::signal::{LogOnlyRouter, PeerRegistry, SignalServer};
use peerlink::{logging, Config};

#[tokio::main]
async fn main() -> peerlink::Result<()> {
    // Initialize tracing
    logging::init(&LogConfig::from_env(), false);

    info!("Starting Peerlink Signalling Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!("Configuration loaded");

    let registry = Arc::new(PeerRegistry::new());

    // Create signalling server; failing to bind is fatal
    let signal_server = SignalServer::with_parts(
        config.signal.clone(),
        registry.clone(),
        Arc::new(LogOnlyRouter),
    );
    let signal_listener = signal_server.bind().await.map_err(|e| {
        error!("Failed to start signalling server: {}", e);
        e
    })?;

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    let signal_shutdown = shutdown_tx.subscribe();
    let signal_task = tokio::spawn(async move {
        if let Err(e) = signal_server.serve(signal_listener, signal_shutdown).await {
            error!("Signalling server error: {}", e);
        }
    });

    // Start status API server
    let api_task = if config.api.enabled {
        let api_server = ApiServer::new(config.api.clone(), registry.clone());
        let api_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            match api_server.bind().await {
                Ok(listener) => {
                    if let Err(e) = api_server.serve(listener, api_shutdown).await {
                        error!("API server error: {}", e);
                    }
                }
                Err(e) => error!("API server disabled: {}", e),
            }
        }))
    } else {
        info!("Status API disabled");
        None
    };

    info!(
        "Servers started - Signalling: {}, API: {}",
        config.signal_addr(),
        if config.api.enabled {
            config.api_addr()
        } else {
            "disabled".to_string()
        }
    );

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);

    let _ = signal_task.await;
    if let Some(api_task) = api_task {
        let _ = api_task.await;
    }

    info!("Peerlink Signalling Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
