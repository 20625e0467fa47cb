//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                | Default        |
//! |-------------------------|----------------|
//! | `LISTEN_ADDR`           | `0.0.0.0:3000` |
//! | `WS_PATH`               | `/ws`          |
//! | `WS_MAX_MESSAGE_BYTES`  | `1048576`      |
//! | `WS_SEND_BUFFER`        | `64`           |
//! | `EVENT_BUS_CAPACITY`    | `1024`         |
//! | `CORS_PERMISSIVE`       | `true`         |
//! | `HTTP_TIMEOUT_SECS`     | `30`           |

use std::net::SocketAddr;
use std::time::Duration;

use crate::gateway::DEFAULT_EVENT_BUS_CAPACITY;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Path the WebSocket endpoint is mounted at.
    pub ws_path: String,

    /// Largest inbound WebSocket message accepted, in bytes.
    pub ws_max_message_bytes: usize,

    /// Capacity of each connection's inbound and outbound frame queues.
    pub ws_send_buffer: usize,

    /// Capacity of the operational event bus.
    pub event_bus_capacity: usize,

    /// Whether to install a permissive CORS layer on the HTTP routes.
    pub cors_permissive: bool,

    /// Deadline for producing an HTTP response. Upgraded sockets are not
    /// affected once the upgrade response is sent.
    pub http_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ws_path: "/ws".to_string(),
            ws_max_message_bytes: 1024 * 1024,
            ws_send_buffer: 64,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
            cors_permissive: true,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or invalid.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(addr) => addr.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let ws_path = std::env::var("WS_PATH")
            .ok()
            .filter(|p| p.starts_with('/'))
            .unwrap_or(defaults.ws_path);

        Ok(Self {
            listen_addr,
            ws_path,
            ws_max_message_bytes: parse_env("WS_MAX_MESSAGE_BYTES", defaults.ws_max_message_bytes),
            ws_send_buffer: parse_env("WS_SEND_BUFFER", defaults.ws_send_buffer),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity),
            cors_permissive: parse_env_bool("CORS_PERMISSIVE", defaults.cors_permissive),
            http_timeout: Duration::from_secs(parse_env(
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.ws_send_buffer, 64);
        assert!(config.cors_permissive);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_variables_fall_back() {
        assert_eq!(parse_env("SOCKET_RPC_GATEWAY_TEST_UNSET_NUMBER", 7usize), 7);
        assert!(parse_env_bool("SOCKET_RPC_GATEWAY_TEST_UNSET_FLAG", true));
    }
}
