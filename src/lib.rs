//! Peerlink - WebSocket signalling server
//!
//! Peers connect over WebSocket, announce themselves with a `Hello <peer_id>`
//! handshake and stay registered for the lifetime of their connection.
//!
//! ## Features
//!
//! - Peer registry keyed by the announced identifier
//! - Periodic heartbeat to every registered peer
//! - Pluggable message routing between peers
//! - Read-only status API over the registry
//! - Command line client for manual testing

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod signal;

pub use config::Config;
pub use error::{PeerlinkError, Result};
