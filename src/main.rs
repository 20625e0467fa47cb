//! socket-rpc-gateway server entry point.
//!
//! Starts the Axum HTTP server with the system endpoints and the protocol
//! WebSocket endpoint, serving a small set of demonstration routes.

use axum::http::StatusCode;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use socket_rpc_gateway::api;
use socket_rpc_gateway::app_state::AppState;
use socket_rpc_gateway::config::GatewayConfig;
use socket_rpc_gateway::domain::{
    GatewayEvent, HandlerError, Route, RouteRequest, RouteResponse, RouteTable, SocketContext,
};
use socket_rpc_gateway::error::GatewayError;
use socket_rpc_gateway::gateway::Gateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        ws_path = %config.ws_path,
        "starting socket-rpc-gateway"
    );

    // Build the gateway
    let gateway = Gateway::builder()
        .routes(demo_routes()?)
        .on_message(|socket: SocketContext, message: Value| async move {
            tracing::debug!(connection_id = %socket.connection_id, "echoing custom message");
            Ok::<_, HandlerError>(json!({ "echo": message }))
        })
        .event_bus_capacity(config.event_bus_capacity)
        .build();

    tokio::spawn(log_events(gateway.events().subscribe()));

    // Build application state
    let app_state = AppState::new(gateway, config);
    let config = std::sync::Arc::clone(&app_state.config);

    // Build router
    let app = api::with_middleware(api::build_router(&config.ws_path), &config)
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes served by the stock binary.
fn demo_routes() -> Result<RouteTable, GatewayError> {
    RouteTable::new()
        .with(
            Route::get("/", |_req: RouteRequest| async {
                Ok::<_, HandlerError>(RouteResponse::text("hello"))
            })
            .with_id("hello"),
        )?
        .with(
            Route::post("/echo", |req: RouteRequest| async move {
                Ok::<_, HandlerError>(RouteResponse::json(req.payload.unwrap_or(Value::Null)))
            })
            .with_id("echo"),
        )?
        .with(
            Route::any("/whoami", |req: RouteRequest| async move {
                Ok::<_, HandlerError>(RouteResponse::json(json!({
                    "connectionId": req.connection_id,
                    "method": req.method.as_str(),
                    "credentials": req.credentials,
                })))
            })
            .with_id("whoami"),
        )?
        .with(Route::get("/teapot", |_req: RouteRequest| async {
            Err::<RouteResponse, _>(HandlerError::with_status(
                StatusCode::IM_A_TEAPOT,
                "short and stout",
            ))
        }))
}

/// Logs operational events until the bus closes.
async fn log_events(mut events: broadcast::Receiver<GatewayEvent>) {
    loop {
        match events.recv().await {
            Ok(GatewayEvent::SerializationFailed {
                connection_id,
                envelope_type,
                reason,
                ..
            }) => {
                tracing::warn!(
                    %connection_id,
                    %envelope_type,
                    %reason,
                    "dropped unencodable envelope"
                );
            }
            Ok(event) => {
                tracing::debug!(
                    connection_id = %event.connection_id(),
                    event_type = event.event_type_str(),
                    "gateway event"
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event logger lagged behind event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
