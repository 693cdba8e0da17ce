//! Handle to a live WebSocket connection

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Maximum number of outbound messages buffered per connection
pub const OUTBOUND_BUFFER_SIZE: usize = 256;

/// Cloneable handle used to enqueue messages for a connection's writer task.
///
/// The writer drains the queue in order, so messages enqueued through any
/// clone of the handle reach the transport in enqueue order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    remote_addr: SocketAddr,
    tx: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl ConnectionHandle {
    pub fn new(remote_addr: SocketAddr, tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a handle together with the receiving end of its outbound queue
    pub fn channel(remote_addr: SocketAddr) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        (Self::new(remote_addr, tx), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Enqueue a message without waiting.
    ///
    /// Returns `false` if the queue is full or the writer has gone away.
    pub fn send(&self, payload: Bytes) -> bool {
        if self.tx.try_send(payload).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the writer side of the connection has shut down
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of messages that could not be enqueued
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
