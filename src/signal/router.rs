//! Message routing extension point
//!
//! Sessions ask the router where each inbound message should go. The server
//! ships without an addressing policy: the default router only observes.

use bytes::Bytes;

use crate::models::PeerId;

/// Decides whether an inbound message is relayed to another registered peer
pub trait MessageRouter: Send + Sync {
    /// Return the peer that should receive `message`, or `None` to keep it local
    fn route(&self, from: &PeerId, message: &Bytes) -> Option<PeerId>;

    /// Router name for logging
    fn name(&self) -> &'static str;
}

/// Router that never relays; inbound messages are only logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyRouter;

impl MessageRouter for LogOnlyRouter {
    fn route(&self, _from: &PeerId, _message: &Bytes) -> Option<PeerId> {
        None
    }

    fn name(&self) -> &'static str {
        "log_only"
    }
}
