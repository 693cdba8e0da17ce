use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Unified error type for the Peerlink server and client
#[derive(Error, Debug)]
pub enum PeerlinkError {
    // Handshake errors
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Handshake timed out after {secs}s")]
    HandshakeTimeout { secs: u64 },

    #[error("Protocol violation: expected {expected:?}, received {received:?}")]
    ProtocolViolation { expected: String, received: String },

    // Transport errors
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // Registry errors
    #[error("Peer not found: {peer_id}")]
    PeerNotFound { peer_id: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Peerlink operations
pub type Result<T> = std::result::Result<T, PeerlinkError>;

impl PeerlinkError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            PeerlinkError::Handshake(_)
            | PeerlinkError::ProtocolViolation { .. }
            | PeerlinkError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found
            PeerlinkError::PeerNotFound { .. } => StatusCode::NOT_FOUND,

            // 408 Request Timeout
            PeerlinkError::HandshakeTimeout { .. } => StatusCode::REQUEST_TIMEOUT,

            // 502 Bad Gateway
            PeerlinkError::ConnectionClosed | PeerlinkError::WebSocket(_) => {
                StatusCode::BAD_GATEWAY
            }

            // 500 Internal Server Error
            PeerlinkError::Bind { .. } | PeerlinkError::Io(_) | PeerlinkError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether this error only means the remote end went away.
    ///
    /// Such errors end a session normally and are never escalated.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            PeerlinkError::ConnectionClosed => true,
            PeerlinkError::WebSocket(e) => is_closed_error(e),
            _ => false,
        }
    }
}

/// Classify a transport error as a plain disconnect
pub fn is_closed_error(err: &tungstenite::Error) -> bool {
    use tungstenite::error::ProtocolError;

    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        tungstenite::Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for PeerlinkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for PeerlinkError {
    fn from(err: url::ParseError) -> Self {
        PeerlinkError::InvalidConfig(err.to_string())
    }
}
