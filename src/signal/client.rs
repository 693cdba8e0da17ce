//! CLI client session
//!
//! Connects to the signalling server, performs the client side of the
//! handshake, then forwards input lines and prints inbound messages.

use std::time::Duration;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::handshake::send_hello;
use super::WsTransport;
use crate::config::ClientConfig;
use crate::error::{is_closed_error, Result};
use crate::models::PeerId;

/// How long to wait for the server's close reply after we close
const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a client session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEnd {
    /// The server closed the connection
    ServerClosed,
    /// Input reached end of file and the client closed the connection
    InputClosed,
    /// The session was interrupted
    Interrupted,
}

/// Signalling client
pub struct SignalClient {
    config: ClientConfig,
}

impl SignalClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::from(self.config.peer_id.as_str())
    }

    /// Open the connection and complete the handshake
    #[instrument(skip(self), fields(uri = %self.config.uri))]
    pub async fn connect(&self) -> Result<ClientStream> {
        let (mut ws, _response) = connect_async(self.config.uri.as_str()).await?;
        send_hello(&mut ws, &self.peer_id()).await?;
        info!("Connection established with server");
        Ok(ws)
    }
}

/// Run the send and print duties over an established connection.
///
/// Each input line is sent as one binary message. Inbound data messages are
/// written to `output` as `Message received : <text>` lines.
pub async fn run_session<S, R, W>(
    ws: S,
    input: R,
    output: &mut W,
    cancel: CancellationToken,
) -> Result<ClientEnd>
where
    S: WsTransport,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();

    let sender = send_lines(&mut sink, input, cancel);
    let printer = print_messages(&mut stream, output);
    tokio::pin!(sender, printer);

    tokio::select! {
        printed = &mut printer => {
            printed?;
            Ok(ClientEnd::ServerClosed)
        }
        sent = &mut sender => {
            let end = sent?;
            if end != ClientEnd::ServerClosed {
                match timeout(CLOSE_GRACE, &mut printer).await {
                    Ok(printed) => printed?,
                    Err(_) => debug!("Server did not acknowledge close"),
                }
            }
            Ok(end)
        }
    }
}

async fn send_lines<K, R>(sink: &mut K, input: R, cancel: CancellationToken) -> Result<ClientEnd>
where
    K: Sink<Message, Error = WsError> + Unpin,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    let end = loop {
        tokio::select! {
            () = cancel.cancelled() => break ClientEnd::Interrupted,
            line = lines.next_line() => match line? {
                Some(line) => match sink.send(Message::binary(Bytes::from(line))).await {
                    Ok(()) => {}
                    Err(e) if is_closed_error(&e) => {
                        info!("Server has disconnected. Unable to send message");
                        return Ok(ClientEnd::ServerClosed);
                    }
                    Err(e) => return Err(e.into()),
                },
                None => break ClientEnd::InputClosed,
            },
        }
    };

    match sink.send(Message::Close(None)).await {
        Ok(()) => {}
        Err(e) if is_closed_error(&e) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(end)
}

async fn print_messages<T, W>(stream: &mut T, output: &mut W) -> Result<()>
where
    T: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) if is_closed_error(&e) => break,
            Err(e) => return Err(e.into()),
        };

        match msg {
            Message::Binary(_) | Message::Text(_) => {
                let line = format!(
                    "Message received : {}\n",
                    String::from_utf8_lossy(&msg.into_data())
                );
                output.write_all(line.as_bytes()).await?;
                output.flush().await?;
            }
            Message::Close(frame) => {
                debug!("Server closed the connection: {:?}", frame);
                break;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    Ok(())
}
