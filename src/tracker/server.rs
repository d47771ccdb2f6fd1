use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::warn;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::registry::{AnnounceRequest, PeerRegistry};
use crate::announce::TrackerResponse;

#[derive(Clone)]
struct TrackerState {
    registry: Arc<PeerRegistry>,
    tracker_id: Arc<str>,
}

pub fn router(registry: Arc<PeerRegistry>, tracker_id: String) -> Router {
    let state = TrackerState {
        registry,
        tracker_id: tracker_id.into(),
    };
    Router::new()
        .route("/", get(announce))
        .route("/announce", get(announce))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn announce(
    State(state): State<TrackerState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match AnnounceRequest::from_query(&params, remote.ip().to_string()) {
        Ok(request) => {
            let response = state.registry.handle(&request, &state.tracker_id);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            warn!("Rejected announce from {}: {}", remote, e);
            let body = TrackerResponse::failure(e.to_string());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(registry: Arc<PeerRegistry>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, router(registry, "tracker123".to_string())));
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn missing_port_yields_400_and_no_registration() {
        let registry = Arc::new(PeerRegistry::new());
        let base = spawn(registry.clone()).await;

        let response = reqwest::get(format!("{}/?peer_id=p1&info_hash=h&event=started", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
        let body: TrackerResponse =
            serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
        assert!(body.failure_reason.unwrap().contains("port"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn started_registers_requester_ip() {
        let registry = Arc::new(PeerRegistry::new());
        let base = spawn(registry.clone()).await;

        let response = reqwest::get(format!(
            "{}/announce?peer_id=p1&port=5000&info_hash=h&event=started",
            base
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = response.bytes().await.unwrap();
        assert!(bytes.starts_with(b"{"));
        let body: TrackerResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.tracker_id.as_deref(), Some("tracker123"));
        let peers = body.peers.unwrap();
        assert_eq!(peers[0].ip, "127.0.0.1");
        assert_eq!(registry.len(), 1);

        let response = reqwest::get(format!(
            "{}/?peer_id=p1&port=5000&info_hash=h&event=stopped",
            base
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(registry.is_empty());
    }
}
