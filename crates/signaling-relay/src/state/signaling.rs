//! Signaling state machine.
//!
//! [`SignalingState`] owns the connection registry and the room directory
//! and applies one event at a time. It never awaits: every outbound frame is
//! queued on the target's connection actor with `try_send`, so a join's
//! snapshot, notifications and insertion happen as one uninterrupted step.
//!
//! Per client the states are: disconnected, connected with no rooms,
//! connected and a member of one or more rooms. Identity is fixed when the
//! connection registers.

use super::directory::{JoinOutcome, RoomDirectory};
use super::registry::ConnectionRegistry;
use crate::actors::{CloseReason, ConnectionActorHandle};
use crate::observability::metrics::{self as prom, DropReason};

use common::types::{ClientId, ConnectionId, RoomId};
use signaling_protocol::{
    ClientMessage, IceCandidatePayload, RoomAnnouncement, ServerFrame, ServerMessage,
    SessionDescriptionPayload,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Result of registering a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Registered,
    /// An older connection for the same client was torn down first.
    Replaced {
        previous: ConnectionId,
        cleanup: LeaveSummary,
    },
}

/// Result of a disconnect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Removed(LeaveSummary),
    /// The connection had already been replaced; nothing changed.
    Stale,
}

/// Rooms a client left and how many peers were told.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveSummary {
    pub rooms_left: Vec<RoomId>,
    pub peers_notified: usize,
}

/// Result of forwarding an SDP or ICE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// Target is not connected.
    Unreachable,
    /// Target is connected but its outbound queue rejected the frame.
    SendFailed,
}

/// Result of handling one decoded client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Joined {
        room_id: RoomId,
        existing_members: usize,
    },
    DuplicateJoin {
        room_id: RoomId,
    },
    Left(LeaveSummary),
    Relayed(RelayOutcome),
    /// Sender is not the current connection for its client ID.
    Stale,
}

/// Registry plus directory, mutated only through the operations below.
#[derive(Debug, Default)]
pub struct SignalingState {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
}

impl SignalingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// A live connection for the same client ID is fully cleaned up (leaves
    /// every room, peers get `remove-peer`) and closed before the new one is
    /// stored.
    pub fn connect(&mut self, handle: ConnectionActorHandle) -> ConnectOutcome {
        let client_id = handle.client_id().clone();

        let outcome = match self
            .registry
            .lookup(&client_id)
            .map(ConnectionActorHandle::connection_id)
        {
            Some(previous) => {
                let cleanup = self.leave_rooms(&client_id, None);
                if let Some(old) = self.registry.unregister(&client_id) {
                    old.handle.close(CloseReason::Replaced);
                }
                prom::record_eviction();
                info!(
                    target: "relay.signaling",
                    client_id = %client_id,
                    previous_connection_id = %previous,
                    connection_id = %handle.connection_id(),
                    rooms_left = cleanup.rooms_left.len(),
                    "Replacing existing connection"
                );
                ConnectOutcome::Replaced { previous, cleanup }
            }
            None => ConnectOutcome::Registered,
        };

        self.registry.insert(handle);
        outcome
    }

    /// Handle a closed or failed connection.
    pub fn disconnect(
        &mut self,
        client_id: &ClientId,
        connection_id: ConnectionId,
    ) -> DisconnectOutcome {
        if !self.registry.is_current(client_id, connection_id) {
            debug!(
                target: "relay.signaling",
                client_id = %client_id,
                connection_id = %connection_id,
                "Ignoring disconnect from superseded connection"
            );
            prom::record_message_dropped(DropReason::StaleConnection);
            return DisconnectOutcome::Stale;
        }

        let summary = self.leave_rooms(client_id, None);
        self.registry.unregister(client_id);
        DisconnectOutcome::Removed(summary)
    }

    /// Apply one decoded message from `client_id` on `connection_id`.
    pub fn handle_inbound(
        &mut self,
        client_id: &ClientId,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> InboundOutcome {
        if !self.registry.is_current(client_id, connection_id) {
            debug!(
                target: "relay.signaling",
                client_id = %client_id,
                connection_id = %connection_id,
                action = message.action(),
                "Dropping message from superseded connection"
            );
            prom::record_message_dropped(DropReason::StaleConnection);
            return InboundOutcome::Stale;
        }

        match message {
            ClientMessage::Join(payload) => self.join(client_id, payload.room_id),
            ClientMessage::Leave(payload) => {
                InboundOutcome::Left(self.leave_rooms(client_id, payload.room_id))
            }
            ClientMessage::RelaySdp(payload) => {
                let message = ServerMessage::SessionDescription(SessionDescriptionPayload {
                    peer_id: client_id.clone(),
                    session_description: payload.session_description,
                });
                InboundOutcome::Relayed(self.relay(&payload.peer_id, message))
            }
            ClientMessage::RelayIce(payload) => {
                let message = ServerMessage::IceCandidate(IceCandidatePayload {
                    peer_id: client_id.clone(),
                    ice_candidate: payload.ice_candidate,
                });
                InboundOutcome::Relayed(self.relay(&payload.peer_id, message))
            }
        }
    }

    /// Close every registered connection. Returns how many were asked.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let mut closed = 0;
        for handle in self.registry.handles() {
            handle.close(reason);
            closed += 1;
        }
        closed
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.directory.room_count()
    }

    #[must_use]
    pub fn rooms_snapshot(&self) -> BTreeMap<RoomId, Vec<ClientId>> {
        self.directory.snapshot()
    }

    /// Rooms `client_id` is subscribed to, empty if not connected.
    #[must_use]
    pub fn rooms_of(&self, client_id: &ClientId) -> BTreeSet<RoomId> {
        self.registry
            .subscriptions_of(client_id)
            .cloned()
            .unwrap_or_default()
    }

    fn join(&mut self, client_id: &ClientId, room_id: RoomId) -> InboundOutcome {
        // Snapshot before anything is sent or the joiner is added.
        let existing = self.directory.members_of(&room_id);

        if self.directory.join(room_id.clone(), client_id.clone()) == JoinOutcome::AlreadyMember {
            warn!(
                target: "relay.signaling",
                client_id = %client_id,
                room_id = %room_id,
                "Duplicate join rejected"
            );
            prom::record_message_dropped(DropReason::DuplicateJoin);
            return InboundOutcome::DuplicateJoin { room_id };
        }
        if let Some(entry) = self.registry.lookup_mut(client_id) {
            entry.subscriptions.insert(room_id.clone());
        }

        for member in &existing {
            self.deliver(
                member,
                ServerMessage::add_peer(client_id.clone(), false).into(),
            );
            self.deliver(
                client_id,
                ServerMessage::add_peer(member.clone(), true).into(),
            );
        }

        let announcement = ServerFrame::from(RoomAnnouncement::joined(client_id));
        for member in &existing {
            self.deliver(member, announcement.clone());
        }

        debug!(
            target: "relay.signaling",
            client_id = %client_id,
            room_id = %room_id,
            existing_members = existing.len(),
            "Client joined room"
        );

        InboundOutcome::Joined {
            room_id,
            existing_members: existing.len(),
        }
    }

    /// Leave the tracked subscriptions plus `explicit`, de-duplicated.
    ///
    /// Only rooms the client is actually in produce `remove-peer` messages.
    fn leave_rooms(&mut self, client_id: &ClientId, explicit: Option<RoomId>) -> LeaveSummary {
        let mut rooms = self.rooms_of(client_id);
        rooms.extend(explicit);

        let mut summary = LeaveSummary::default();
        for room_id in rooms {
            if self.directory.leave(&room_id, client_id) {
                let remaining = self.directory.members_of(&room_id);
                for member in &remaining {
                    self.deliver(member, ServerMessage::remove_peer(client_id.clone()).into());
                }
                summary.peers_notified += remaining.len();
                summary.rooms_left.push(room_id.clone());
            }
            if let Some(entry) = self.registry.lookup_mut(client_id) {
                entry.subscriptions.remove(&room_id);
            }
        }

        if !summary.rooms_left.is_empty() {
            debug!(
                target: "relay.signaling",
                client_id = %client_id,
                rooms_left = summary.rooms_left.len(),
                peers_notified = summary.peers_notified,
                "Client left rooms"
            );
        }

        summary
    }

    fn relay(&self, target: &ClientId, message: ServerMessage) -> RelayOutcome {
        let Some(handle) = self.registry.lookup(target) else {
            debug!(
                target: "relay.signaling",
                from = %message.peer_id(),
                to = %target,
                action = message.action(),
                "Relay target not connected, dropping"
            );
            prom::record_message_dropped(DropReason::UnreachablePeer);
            return RelayOutcome::Unreachable;
        };

        match handle.try_deliver(message.into()) {
            Ok(()) => RelayOutcome::Delivered,
            Err(e) => {
                debug!(
                    target: "relay.signaling",
                    to = %target,
                    error = %e,
                    "Relay send failed"
                );
                prom::record_message_dropped(DropReason::SendFailed);
                RelayOutcome::SendFailed
            }
        }
    }

    /// Fire-and-forget send. Absent or failing targets are treated as
    /// unreachable.
    fn deliver(&self, to: &ClientId, frame: ServerFrame) {
        let Some(handle) = self.registry.lookup(to) else {
            return;
        };
        if let Err(e) = handle.try_deliver(frame) {
            debug!(
                target: "relay.signaling",
                to = %to,
                error = %e,
                "Send failed, peer treated as unreachable"
            );
            prom::record_message_dropped(DropReason::SendFailed);
        }
    }
}
