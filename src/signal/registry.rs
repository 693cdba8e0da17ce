//! Peer registry
//!
//! Maps handshaken peer ids to the connection currently bound to them.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::connection::ConnectionHandle;
use crate::models::{PeerId, PeerSummary};

/// A registered peer and the connection it is bound to
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub peer_id: PeerId,
    pub connection: ConnectionHandle,
    pub remote_addr: SocketAddr,
    pub registered_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            peer_id: self.peer_id.clone(),
            connection_id: self.connection.id(),
            remote_addr: self.remote_addr,
            registered_at: self.registered_at,
            dropped_messages: self.connection.dropped_messages(),
        }
    }
}

/// In-memory registry shared by all connection tasks.
///
/// Writers to the same peer id are serialized by the map's shard locks. A
/// later registration for a peer id replaces the earlier one; the replaced
/// connection is left open and keeps running its own session.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<PeerId, RegistryEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Bind `peer_id` to `connection`, returning the entry it replaced
    pub fn register(&self, peer_id: PeerId, connection: ConnectionHandle) -> Option<RegistryEntry> {
        let entry = RegistryEntry {
            peer_id: peer_id.clone(),
            remote_addr: connection.remote_addr(),
            connection,
            registered_at: Utc::now(),
        };
        self.peers.insert(peer_id, entry)
    }

    pub fn lookup(&self, peer_id: &PeerId) -> Option<RegistryEntry> {
        self.peers.get(peer_id).map(|e| e.value().clone())
    }

    /// Remove `peer_id` if it is still bound to `connection_id`.
    ///
    /// Returns `false` when the entry is gone or belongs to a newer connection.
    pub fn unregister(&self, peer_id: &PeerId, connection_id: Uuid) -> bool {
        self.peers
            .remove_if(peer_id, |_, entry| entry.connection.id() == connection_id)
            .is_some()
    }

    /// Snapshot of all entries, oldest registration first
    pub fn peers(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> =
            self.peers.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.registered_at);
        entries
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
