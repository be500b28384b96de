//! Message types for actor communication.
//!
//! The WebSocket transport talks to the relay actor with [`RelayMessage`];
//! the relay actor talks to connection actors with [`ConnectionMessage`].

use crate::errors::RelayError;

use super::connection::ConnectionActorHandle;

use common::types::{ClientId, ConnectionId, RoomId};
use signaling_protocol::{ClientMessage, ServerFrame};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Messages handled by the `RelayActor`.
#[derive(Debug)]
pub enum RelayMessage {
    /// A WebSocket was accepted and its connection actor is running.
    Connect {
        handle: ConnectionActorHandle,
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },

    /// A decoded client message.
    Inbound {
        client_id: ClientId,
        connection_id: ConnectionId,
        message: ClientMessage,
        /// When the frame was read off the socket, for latency metrics.
        received_at: Instant,
    },

    /// The socket for `connection_id` closed or failed.
    Disconnect {
        client_id: ClientId,
        connection_id: ConnectionId,
    },

    GetStatus {
        respond_to: oneshot::Sender<RelayStatus>,
    },

    /// Stop accepting connections and close every open one.
    Shutdown {
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },
}

/// Point-in-time view of the relay, for health reporting and tests.
#[derive(Debug, Clone)]
pub struct RelayStatus {
    pub instance_id: String,
    pub connection_count: usize,
    pub room_count: usize,
    /// Members of every non-empty room, sorted.
    pub rooms: BTreeMap<RoomId, Vec<ClientId>>,
    pub is_draining: bool,
    /// Messages queued behind the status request.
    pub mailbox_depth: usize,
    /// Deepest relay mailbox backlog since start.
    pub peak_mailbox_depth: usize,
    /// Connection actors still running, including evicted ones closing down.
    pub active_writers: usize,
    pub frames_sent: u64,
    pub actor_panics: u64,
}

impl RelayStatus {
    /// Members of `room_id`, empty if the room does not exist.
    #[must_use]
    pub fn members_of(&self, room_id: &str) -> &[ClientId] {
        self.rooms
            .get(&RoomId::from(room_id))
            .map_or(&[], Vec::as_slice)
    }
}

/// Why a connection actor is being asked to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer connection registered the same client ID.
    Replaced,
    /// The relay is shutting down.
    ShuttingDown,
}

impl CloseReason {
    /// WebSocket close code sent to the peer.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            // Private-use range (4000-4999).
            CloseReason::Replaced => 4000,
            CloseReason::ShuttingDown => axum::extract::ws::close_code::AWAY,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Replaced => "replaced by newer connection",
            CloseReason::ShuttingDown => "relay shutting down",
        }
    }
}

/// Messages handled by a `ConnectionActor`.
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Write a frame to the socket.
    Deliver { frame: ServerFrame },

    /// Send a close frame and stop.
    Close { reason: CloseReason },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_codes() {
        assert_eq!(CloseReason::Replaced.close_code(), 4000);
        assert_eq!(CloseReason::ShuttingDown.close_code(), 1001);
    }

    #[test]
    fn test_status_members_of_missing_room() {
        let status = RelayStatus {
            instance_id: "relay-test".to_string(),
            connection_count: 0,
            room_count: 0,
            rooms: BTreeMap::new(),
            is_draining: false,
            mailbox_depth: 0,
            peak_mailbox_depth: 0,
            active_writers: 0,
            frames_sent: 0,
            actor_panics: 0,
        };

        assert!(status.members_of("lobby").is_empty());
    }
}
