//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::gateway::Gateway;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Protocol gateway: routes, handlers, connections, events.
    pub gateway: Arc<Gateway>,
    /// Runtime configuration.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Bundles a gateway with its configuration.
    #[must_use]
    pub fn new(gateway: Gateway, config: GatewayConfig) -> Self {
        Self {
            gateway: Arc::new(gateway),
            config: Arc::new(config),
        }
    }
}
