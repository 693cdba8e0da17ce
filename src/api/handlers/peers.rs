//! Peer registry handlers

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::api::server::AppState;
use crate::error::PeerlinkError;
use crate::models::{PeerId, PeerListResponse};

/// List all registered peers
pub async fn list_peers(State(state): State<AppState>) -> impl IntoResponse {
    let peers: Vec<_> = state
        .registry
        .peers()
        .iter()
        .map(|entry| entry.summary())
        .collect();

    Json(PeerListResponse {
        total: peers.len(),
        peers,
    })
}

/// Get a single registered peer
pub async fn get_peer(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
) -> Result<impl IntoResponse, PeerlinkError> {
    match state.registry.lookup(&PeerId::from(peer_id.as_str())) {
        Some(entry) => Ok(Json(entry.summary())),
        None => Err(PeerlinkError::PeerNotFound { peer_id }),
    }
}
