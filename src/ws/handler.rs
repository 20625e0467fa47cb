//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET {WS_PATH}`: upgrades the HTTP connection to a protocol socket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let gateway = Arc::clone(&state.gateway);
    let send_buffer = state.config.ws_send_buffer;

    ws.max_message_size(state.config.ws_max_message_bytes)
        .on_upgrade(move |socket| run_connection(socket, gateway, send_buffer))
}
