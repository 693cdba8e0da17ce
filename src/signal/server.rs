//! Signalling server accept loop
//!
//! Accepts TCP connections, upgrades them to WebSocket and runs one
//! handshake + session pipeline per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use super::connection::ConnectionHandle;
use super::handshake::accept_hello;
use super::registry::PeerRegistry;
use super::router::{LogOnlyRouter, MessageRouter};
use super::session::{Session, SessionConfig, SessionEnd};
use crate::config::SignalServerConfig;
use crate::error::{PeerlinkError, Result};

/// Signalling server
pub struct SignalServer {
    config: SignalServerConfig,
    registry: Arc<PeerRegistry>,
    router: Arc<dyn MessageRouter>,
}

/// Everything a connection task needs from the server
#[derive(Clone)]
struct ConnectionContext {
    registry: Arc<PeerRegistry>,
    router: Arc<dyn MessageRouter>,
    session: SessionConfig,
    handshake_timeout: Option<Duration>,
}

impl SignalServer {
    /// Create a new signalling server with an empty registry
    pub fn new(config: SignalServerConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(PeerRegistry::new()),
            Arc::new(LogOnlyRouter),
        )
    }

    /// Create a server around an existing registry and router
    pub fn with_parts(
        config: SignalServerConfig,
        registry: Arc<PeerRegistry>,
        router: Arc<dyn MessageRouter>,
    ) -> Self {
        Self {
            config,
            registry,
            router,
        }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| PeerlinkError::Bind { addr, source })
    }

    /// Run the accept loop on an already bound listener
    #[instrument(skip(self, listener, shutdown))]
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(
            "Signalling server listening on {} (router: {})",
            listener.local_addr()?,
            self.router.name()
        );

        let ctx = ConnectionContext {
            registry: self.registry.clone(),
            router: self.router.clone(),
            session: SessionConfig::from(&self.config),
            handshake_timeout: self.config.handshake_timeout(),
        };
        let sessions = TaskTracker::new();
        let cancel = CancellationToken::new();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, remote_addr)) => {
                            let ctx = ctx.clone();
                            let cancel = cancel.child_token();

                            sessions.spawn(async move {
                                match handle_connection(stream, remote_addr, ctx, cancel).await {
                                    Ok(end) => debug!("Connection {} finished: {}", remote_addr, end.as_str()),
                                    Err(e) if e.is_connection_closed() => {
                                        debug!("Connection {} closed during handshake", remote_addr);
                                    }
                                    Err(e) => warn!("Connection {} error: {}", remote_addr, e),
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Signalling server shutting down");
                        break;
                    }
                }
            }
        }

        drop(listener);
        cancel.cancel();
        sessions.close();

        let drain = self.config.shutdown_drain();
        if timeout(drain, sessions.wait()).await.is_err() {
            warn!(
                "{} sessions still open after {}s drain",
                sessions.len(),
                drain.as_secs()
            );
        }

        info!("Signalling server stopped");
        Ok(())
    }
}

/// Handshake, register and run the session for one accepted connection
#[instrument(skip(stream, ctx, cancel))]
async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    ctx: ConnectionContext,
    cancel: CancellationToken,
) -> Result<SessionEnd> {
    info!("Connected to {}", remote_addr);

    let mut ws = within(ctx.handshake_timeout, async {
        accept_async(stream).await.map_err(PeerlinkError::from)
    })
    .await?;

    let peer_id = match within(ctx.handshake_timeout, accept_hello(&mut ws)).await {
        Ok(peer_id) => peer_id,
        Err(e) => {
            warn!("Handshake with {} failed: {}", remote_addr, e);
            if let Err(close_err) = ws.close(None).await {
                debug!("Close after failed handshake not sent: {}", close_err);
            }
            return Err(e);
        }
    };

    let (connection, outbound) = ConnectionHandle::channel(remote_addr);
    if let Some(stale) = ctx.registry.register(peer_id.clone(), connection.clone()) {
        warn!(
            "Peer {} re-registered, replacing connection from {}",
            peer_id, stale.remote_addr
        );
    }
    info!("Connection established with client {}", peer_id);

    let session = Session::new(
        peer_id.clone(),
        connection,
        ctx.registry.clone(),
        ctx.router.clone(),
        ctx.session,
    );
    let end = session.run(ws, outbound, cancel).await;

    info!("Session for {} ended: {}", peer_id, end.as_str());
    Ok(end)
}

/// Bound `fut` by the handshake timeout, if one is configured
async fn within<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| PeerlinkError::HandshakeTimeout {
                secs: limit.as_secs(),
            })?,
        None => fut.await,
    }
}
