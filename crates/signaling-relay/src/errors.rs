//! Signaling relay error types.
//!
//! Peers never see these. Runtime conditions (malformed frames, unreachable
//! peers, duplicate joins) are absorbed by the relay and only logged; the
//! errors here surface from startup and from actor handle calls.

use crate::config::ConfigError;
use thiserror::Error;

/// Signaling relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener could not be bound.
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// HTTP or WebSocket server failed while running.
    #[error("Server error: {0}")]
    Server(String),

    /// Actor mailbox or reply channel closed.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Relay is draining (graceful shutdown).
    #[error("Relay is draining")]
    Draining,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether this error should stop the process.
    ///
    /// Startup and server failures are fatal. Channel and draining errors
    /// only affect the connection that hit them.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            RelayError::Config(_) | RelayError::Bind { .. } | RelayError::Server(_) => true,
            RelayError::ChannelClosed(_) | RelayError::Draining | RelayError::Internal(_) => {
                false
            }
        }
    }
}

impl From<ConfigError> for RelayError {
    fn from(err: ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}
