//! HTTP layer: system endpoints, router composition and middleware.

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::ws::handler::ws_handler;

/// Builds the complete router: system endpoints plus the WebSocket
/// endpoint mounted at `ws_path`.
pub fn build_router(ws_path: &str) -> Router<AppState> {
    Router::new()
        .merge(handlers::system::routes())
        .route(ws_path, get(ws_handler))
}

/// Wraps a router in the service middleware stack: request tracing, the
/// response deadline (`408 Request Timeout` when exceeded) and, when
/// enabled, permissive CORS.
pub fn with_middleware(router: Router<AppState>, config: &GatewayConfig) -> Router<AppState> {
    let router = router
        .layer(TimeoutLayer::new(config.http_timeout))
        .layer(TraceLayer::new_for_http());
    if config.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
