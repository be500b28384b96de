//! Signaling relay configuration.
//!
//! Configuration is loaded from environment variables. Every value has a
//! default, so an empty environment yields a working local setup.

use common::config::{LogFormat, ObservabilityConfig};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Default WebSocket signaling bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5173";

/// Default WebSocket upgrade path.
pub const DEFAULT_WS_PATH: &str = "/api/_ws";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default per-connection outbound queue size.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 200;

/// Default relay actor mailbox size.
pub const DEFAULT_MAILBOX_BUFFER: usize = 1000;

/// Default time allowed for connections to drain on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "signaling_relay=debug,tower_http=debug";

/// Default relay instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "relay";

/// Signaling relay configuration.
#[derive(Clone)]
pub struct Config {
    /// WebSocket server bind address (default: "0.0.0.0:5173").
    pub bind_address: SocketAddr,

    /// Route that accepts WebSocket upgrades (default: "/api/_ws").
    pub ws_path: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: SocketAddr,

    /// Identifier for this relay instance, attached to logs.
    pub instance_id: String,

    /// Outbound frames buffered per connection before sends start failing.
    pub outbound_buffer: usize,

    /// Relay actor mailbox capacity.
    pub mailbox_buffer: usize,

    /// Seconds to wait for connections to close during shutdown.
    pub shutdown_grace_seconds: u64,

    /// Logging setup.
    pub observability: ObservabilityConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("ws_path", &self.ws_path)
            .field("health_bind_address", &self.health_bind_address)
            .field("instance_id", &self.instance_id)
            .field("outbound_buffer", &self.outbound_buffer)
            .field("mailbox_buffer", &self.mailbox_buffer)
            .field("shutdown_grace_seconds", &self.shutdown_grace_seconds)
            .field("log_format", &self.observability.log_format)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but unusable.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = parse_addr(vars, "RELAY_BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;
        let health_bind_address =
            parse_addr(vars, "RELAY_HEALTH_BIND_ADDRESS", DEFAULT_HEALTH_BIND_ADDRESS)?;

        let ws_path = vars
            .get("RELAY_WS_PATH")
            .cloned()
            .unwrap_or_else(|| DEFAULT_WS_PATH.to_string());
        if !ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "RELAY_WS_PATH must start with '/', got '{ws_path}'"
            )));
        }

        let outbound_buffer =
            parse_buffer(vars, "RELAY_OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER)?;
        let mailbox_buffer = parse_buffer(vars, "RELAY_MAILBOX_BUFFER", DEFAULT_MAILBOX_BUFFER)?;

        let shutdown_grace_seconds = match vars.get("RELAY_SHUTDOWN_GRACE_SECONDS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue(format!("RELAY_SHUTDOWN_GRACE_SECONDS='{raw}': {e}"))
            })?,
            None => DEFAULT_SHUTDOWN_GRACE_SECONDS,
        };

        let log_format = match vars.get("RELAY_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::InvalidValue(format!("RELAY_LOG_FORMAT: {e}")))?,
            None => LogFormat::default(),
        };

        let instance_id = vars.get("RELAY_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            ws_path,
            health_bind_address,
            instance_id,
            outbound_buffer,
            mailbox_buffer,
            shutdown_grace_seconds,
            observability: ObservabilityConfig {
                log_filter: DEFAULT_LOG_FILTER.to_string(),
                log_format,
            },
        })
    }
}

fn parse_addr(
    vars: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let raw = vars.get(key).map_or(default, String::as_str);
    raw.parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{key}='{raw}': {e}")))
}

fn parse_buffer(
    vars: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(format!(
                "{key} must be a positive integer, got '{raw}'"
            ))),
            Ok(n) => Ok(n),
        },
    }
}
