//! Signalling server implementation
//!
//! This module provides the peer connection substrate:
//! - WebSocket accept loop
//! - `Hello <peer id>` handshake
//! - Peer registry keyed by handshaken peer id
//! - Per-connection sessions with heartbeat and routing hook
//! - CLI client session

pub mod client;
pub mod connection;
pub mod handshake;
pub mod heartbeat;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;

pub use client::{run_session, ClientEnd, SignalClient};
pub use connection::ConnectionHandle;
pub use registry::{PeerRegistry, RegistryEntry};
pub use router::{LogOnlyRouter, MessageRouter};
pub use server::SignalServer;
pub use session::{Session, SessionConfig, SessionEnd};

use futures::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Handshake acknowledgment and heartbeat payload
pub const HELLO: &[u8] = b"Hello";

/// A message-oriented WebSocket transport usable by handshakes and sessions
pub trait WsTransport:
    Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send
{
}

impl<T> WsTransport for T where
    T: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send
{
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use bytes::Bytes;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::WebSocketStream;

    use super::MessageRouter;
    use crate::models::PeerId;

    /// Connected server/client WebSocket pair over an in-memory pipe
    pub async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        tokio::join!(
            WebSocketStream::from_raw_socket(server_io, Role::Server, None),
            WebSocketStream::from_raw_socket(client_io, Role::Client, None),
        )
    }

    /// Router that records every message it sees and optionally relays it
    #[derive(Default)]
    pub struct RecordingRouter {
        target: Option<PeerId>,
        seen: Mutex<Vec<Bytes>>,
    }

    impl RecordingRouter {
        pub fn relaying_to(target: &str) -> Self {
            Self {
                target: Some(PeerId::from(target)),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn received(&self) -> Vec<Bytes> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl MessageRouter for RecordingRouter {
        fn route(&self, _from: &PeerId, message: &Bytes) -> Option<PeerId> {
            self.seen.lock().unwrap().push(message.clone());
            self.target.clone()
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }
}
