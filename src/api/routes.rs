//! API route definitions

use axum::routing::get;
use axum::Router;

use super::handlers;
use super::server::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/peers", get(handlers::peers::list_peers))
        .route("/api/peers/:peer_id", get(handlers::peers::get_peer))
        .with_state(state)
}
