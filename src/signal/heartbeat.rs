//! Periodic keep-alive messages for an active session.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::connection::ConnectionHandle;
use super::HELLO;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The connection's writer went away.
    Disconnected,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Enqueue `Hello` on `connection` every `interval` until cancelled.
///
/// The first beat goes out one full interval after the call. A full outbound
/// queue only skips that beat; a closed queue ends the loop.
pub async fn run_heartbeat(
    connection: ConnectionHandle,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut beat = time::interval_at(time::Instant::now() + interval, interval);
    beat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
            _ = beat.tick() => {
                if connection.send(Bytes::from_static(HELLO)) {
                    continue;
                }
                if connection.is_closed() {
                    info!(
                        remote_addr = %connection.remote_addr(),
                        "Client has disconnected. Unable to send heartbeat"
                    );
                    return HeartbeatResult::Disconnected;
                }
                debug!(
                    remote_addr = %connection.remote_addr(),
                    "Outbound queue full, skipping heartbeat"
                );
            }
        }
    }
}
