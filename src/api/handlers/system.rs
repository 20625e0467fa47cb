//! System endpoints: health check and live connection listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::ConnectionSummary;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    connections: usize,
}

/// `GET /health`: service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the number of open sockets.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections: state.gateway.registry().len().await,
        }),
    )
}

/// Live connection listing.
#[derive(Debug, Serialize, ToSchema)]
struct ConnectionsResponse {
    connections: Vec<ConnectionSummary>,
}

/// `GET /connections`: open sockets, oldest first.
#[utoipa::path(
    get,
    path = "/connections",
    tag = "System",
    summary = "List connections",
    description = "Returns the identifier and open time of every live WebSocket connection.",
    responses(
        (status = 200, description = "Live connections", body = ConnectionsResponse),
    )
)]
pub async fn connections_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.gateway.registry().list().await;
    (StatusCode::OK, Json(ConnectionsResponse { connections }))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/connections", get(connections_handler))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::gateway::Gateway;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let Ok(body) = serde_json::from_slice(&bytes) else {
            panic!("body should be JSON");
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_connection_count() {
        let state = AppState::new(Gateway::builder().build(), GatewayConfig::default());
        let app = routes().with_state(state);

        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn connections_lists_registered_handles() {
        let state = AppState::new(Gateway::builder().build(), GatewayConfig::default());
        let (tx, _rx) = mpsc::channel(1);
        let handle = state.gateway.connection_handle(tx);
        let id = handle.id();
        assert!(state.gateway.registry().add(handle).await.is_ok());

        let app = routes().with_state(state);
        let (status, body) = get_json(app, "/connections").await;
        assert_eq!(status, StatusCode::OK);
        let Some(list) = body["connections"].as_array() else {
            panic!("expected an array");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(
            list.first().map(|c| c["connection_id"].clone()),
            Some(Value::String(id.to_string()))
        );
    }
}
