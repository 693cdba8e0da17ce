use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Opaque peer identifier supplied by the remote end during the handshake.
///
/// No format or uniqueness rules apply; the bytes are only used as a lookup key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PeerId(Bytes);

impl PeerId {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 rendering for logs and the status API
    pub fn to_display_string(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<Bytes> for PeerId {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_display_string())
    }
}

/// Registry entry as exposed by the status API
#[derive(Debug, Clone, Serialize)]
pub struct PeerSummary {
    pub peer_id: PeerId,
    pub connection_id: Uuid,
    pub remote_addr: SocketAddr,
    pub registered_at: DateTime<Utc>,
    /// Outbound messages dropped because the connection's queue was full or closed
    pub dropped_messages: u64,
}

/// Response body for GET /api/peers
#[derive(Debug, Clone, Serialize)]
pub struct PeerListResponse {
    pub peers: Vec<PeerSummary>,
    pub total: usize,
}
