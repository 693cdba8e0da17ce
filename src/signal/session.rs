//! Post-handshake lifecycle of a single peer connection
//!
//! A session runs three duties over one WebSocket until it closes:
//! - listener: reads inbound messages, logs them and hands them to the router
//! - heartbeat: enqueues `Hello` on a fixed interval
//! - writer: owns the sink and drains the outbound queue in order
//!
//! All duties share one cancellation token. Whichever duty sees the
//! connection go away cancels it, and the session joins every duty before
//! retiring its registry entry.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ConnectionHandle;
use super::heartbeat::run_heartbeat;
use super::registry::PeerRegistry;
use super::router::MessageRouter;
use super::WsTransport;
use crate::config::SignalServerConfig;
use crate::error::is_closed_error;
use crate::models::PeerId;

/// Timing knobs for a session
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(3),
            idle_timeout: None,
        }
    }
}

impl From<&SignalServerConfig> for SessionConfig {
    fn from(config: &SignalServerConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote end closed the connection or dropped the transport
    ClientClosed,
    /// Reading or writing failed for another reason
    TransportError,
    /// No inbound traffic within the idle timeout
    IdleTimeout,
    /// The server is shutting down
    Shutdown,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::IdleTimeout => "idle_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A registered peer's active session
pub struct Session {
    peer_id: PeerId,
    connection: ConnectionHandle,
    registry: Arc<PeerRegistry>,
    router: Arc<dyn MessageRouter>,
    config: SessionConfig,
}

impl Session {
    pub fn new(
        peer_id: PeerId,
        connection: ConnectionHandle,
        registry: Arc<PeerRegistry>,
        router: Arc<dyn MessageRouter>,
        config: SessionConfig,
    ) -> Self {
        Self {
            peer_id,
            connection,
            registry,
            router,
            config,
        }
    }

    /// Run until the connection closes or `shutdown` is cancelled.
    ///
    /// `outbound` must be the receiving end of this session's connection handle.
    #[instrument(
        skip_all,
        fields(peer_id = %self.peer_id, remote_addr = %self.connection.remote_addr())
    )]
    pub async fn run<S>(
        self,
        ws: S,
        outbound: mpsc::Receiver<Bytes>,
        shutdown: CancellationToken,
    ) -> SessionEnd
    where
        S: WsTransport + 'static,
    {
        let cancel = shutdown.child_token();
        let (sink, mut stream) = ws.split();

        let writer = tokio::spawn(run_writer(sink, outbound, cancel.clone()));
        let heartbeat = tokio::spawn(run_heartbeat(
            self.connection.clone(),
            self.config.heartbeat_interval,
            cancel.clone(),
        ));

        let mut end = self.listen(&mut stream, &cancel, &shutdown).await;

        cancel.cancel();
        match writer.await {
            Ok(Some(reason)) if end == SessionEnd::TransportError => end = reason,
            Ok(_) => {}
            Err(e) => warn!("Writer task failed: {}", e),
        }
        match heartbeat.await {
            Ok(result) => debug!("Heartbeat stopped: {:?}", result),
            Err(e) => warn!("Heartbeat task failed: {}", e),
        }

        if self.registry.unregister(&self.peer_id, self.connection.id()) {
            info!("Peer unregistered");
        } else {
            debug!("Registry entry already replaced by a newer connection");
        }

        end
    }

    async fn listen<R>(
        &self,
        stream: &mut R,
        cancel: &CancellationToken,
        shutdown: &CancellationToken,
    ) -> SessionEnd
    where
        R: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        loop {
            let next = async {
                match self.config.idle_timeout {
                    Some(limit) => time::timeout(limit, stream.next()).await.ok(),
                    None => Some(stream.next().await),
                }
            };

            let received = tokio::select! {
                () = cancel.cancelled() => {
                    return if shutdown.is_cancelled() {
                        SessionEnd::Shutdown
                    } else {
                        SessionEnd::TransportError
                    };
                }
                received = next => received,
            };

            match received {
                None => {
                    info!("No traffic within idle timeout, closing connection");
                    return SessionEnd::IdleTimeout;
                }
                Some(None) => {
                    info!("Client has disconnected");
                    return SessionEnd::ClientClosed;
                }
                Some(Some(Err(e))) => {
                    if is_closed_error(&e) {
                        info!("Client has disconnected: {}", e);
                        return SessionEnd::ClientClosed;
                    }
                    warn!("Unable to read from client: {}", e);
                    return SessionEnd::TransportError;
                }
                Some(Some(Ok(msg))) => match msg {
                    Message::Binary(_) | Message::Text(_) => self.on_message(msg.into_data()),
                    Message::Close(frame) => {
                        info!("Client closed the connection: {:?}", frame);
                        return SessionEnd::ClientClosed;
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                },
            }
        }
    }

    fn on_message(&self, payload: Bytes) {
        info!("Message received : {}", String::from_utf8_lossy(&payload));

        let Some(target) = self.router.route(&self.peer_id, &payload) else {
            return;
        };

        match self.registry.lookup(&target) {
            Some(entry) => {
                if entry.connection.send(payload) {
                    debug!(target = %target, "Message relayed");
                } else {
                    warn!(target = %target, "Relay target unavailable, message dropped");
                }
            }
            None => {
                warn!(target = %target, "Relay target not registered, message dropped");
            }
        }
    }
}

/// Drain the outbound queue into the sink until cancelled or the send fails.
///
/// Returns the reason the session should end when a failed send stopped it.
async fn run_writer<K>(
    mut sink: K,
    mut outbound: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> Option<SessionEnd>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                if let Err(e) = sink.send(Message::binary(payload)).await {
                    let reason = if is_closed_error(&e) {
                        info!("Client has disconnected. Unable to send message");
                        SessionEnd::ClientClosed
                    } else {
                        warn!("Failed to send message: {}", e);
                        SessionEnd::TransportError
                    };
                    cancel.cancel();
                    return Some(reason);
                }
            }
        }
    }

    outbound.close();
    match sink.send(Message::Close(None)).await {
        Ok(()) => debug!("Close frame sent"),
        Err(e) => debug!("Close frame not sent: {}", e),
    }
    None
}
