//! Opening exchange that binds a connection to a peer id
//!
//! The opener is `Hello <peer id>`. The server splits it at the first
//! whitespace byte, ignores the leading token, takes the remainder verbatim
//! as the peer id, and answers with `Hello`.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::{WsTransport, HELLO};
use crate::error::{PeerlinkError, Result};
use crate::models::PeerId;

/// Whitespace bytes accepted as the token separator
fn is_separator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Extract the peer id from an opening message.
///
/// Leading whitespace is skipped, then exactly one separator byte after the
/// first token is consumed; everything after it belongs to the peer id.
pub fn parse_hello(message: &Bytes) -> Result<PeerId> {
    let start = message
        .iter()
        .position(|&b| !is_separator(b))
        .ok_or_else(|| PeerlinkError::Handshake("empty opening message".into()))?;

    let split = message[start..]
        .iter()
        .position(|&b| is_separator(b))
        .map(|offset| start + offset)
        .ok_or_else(|| PeerlinkError::Handshake("opening message has no separator".into()))?;

    let peer_id = message.slice(split + 1..);
    if peer_id.is_empty() {
        return Err(PeerlinkError::Handshake(
            "opening message carries an empty peer id".into(),
        ));
    }

    Ok(PeerId::new(peer_id))
}

/// Build the opening message a client sends for `peer_id`
pub fn hello_message(peer_id: &PeerId) -> Bytes {
    Bytes::from([HELLO, b" ".as_slice(), peer_id.as_bytes()].concat())
}

/// Wait for the next data message, skipping control frames
pub async fn next_payload<S: WsTransport>(ws: &mut S) -> Result<Bytes> {
    while let Some(msg) = ws.next().await {
        match msg? {
            msg @ (Message::Binary(_) | Message::Text(_)) => return Ok(msg.into_data()),
            Message::Close(frame) => {
                debug!("Close frame received during handshake: {:?}", frame);
                return Err(PeerlinkError::ConnectionClosed);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    Err(PeerlinkError::ConnectionClosed)
}

/// Server side: read the opener, acknowledge it and return the peer id
pub async fn accept_hello<S: WsTransport>(ws: &mut S) -> Result<PeerId> {
    let opener = next_payload(ws).await?;
    let peer_id = parse_hello(&opener)?;

    ws.send(Message::binary(Bytes::from_static(HELLO))).await?;
    Ok(peer_id)
}

/// Client side: announce `peer_id` and require the literal acknowledgment
pub async fn send_hello<S: WsTransport>(ws: &mut S, peer_id: &PeerId) -> Result<()> {
    ws.send(Message::binary(hello_message(peer_id))).await?;

    let reply = next_payload(ws).await?;
    if reply.as_ref() != HELLO {
        return Err(PeerlinkError::ProtocolViolation {
            expected: String::from_utf8_lossy(HELLO).into_owned(),
            received: String::from_utf8_lossy(&reply).into_owned(),
        });
    }

    Ok(())
}
