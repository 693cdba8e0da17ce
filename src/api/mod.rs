//! Status API implementation
//!
//! Provides read-only HTTP endpoints over the peer registry.

pub mod handlers;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::routes::create_router;
    use super::AppState;
    use crate::models::PeerId;
    use crate::signal::{ConnectionHandle, PeerRegistry};

    fn state_with(peers: &[&str]) -> AppState {
        let registry = Arc::new(PeerRegistry::new());
        for (i, peer) in peers.iter().enumerate() {
            let addr = format!("127.0.0.1:{}", 6000 + i).parse().unwrap();
            registry.register(PeerId::from(*peer), ConnectionHandle::channel(addr).0);
        }
        AppState {
            registry,
            started_at: Instant::now(),
        }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_peer_count() {
        let (status, body) = get(state_with(&["a", "b"]), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["peers"], 2);
    }

    #[tokio::test]
    async fn test_list_peers() {
        let (status, body) = get(state_with(&["1234", "cam"]), "/api/peers").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);

        let mut ids: Vec<&str> = body["peers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["peer_id"].as_str().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1234", "cam"]);
    }

    #[tokio::test]
    async fn test_get_peer() {
        let (status, body) = get(state_with(&["1234"]), "/api/peers/1234").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peer_id"], "1234");
        assert_eq!(body["remote_addr"], "127.0.0.1:6000");
        assert_eq!(body["dropped_messages"], 0);
    }

    #[tokio::test]
    async fn test_get_peer_reports_dropped_messages() {
        let state = state_with(&["1234"]);
        let entry = state.registry.lookup(&PeerId::from("1234")).unwrap();
        // The writer side is gone, so nothing can be enqueued
        assert!(!entry.connection.send(bytes::Bytes::from_static(b"Hello")));
        assert!(!entry.connection.send(bytes::Bytes::from_static(b"Hello")));

        let (status, body) = get(state, "/api/peers/1234").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dropped_messages"], 2);
    }

    #[tokio::test]
    async fn test_get_peer_with_space_in_id() {
        let (status, body) = get(state_with(&["front door"]), "/api/peers/front%20door").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peer_id"], "front door");
    }

    #[tokio::test]
    async fn test_get_unknown_peer_is_404() {
        let (status, body) = get(state_with(&[]), "/api/peers/missing").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }
}
