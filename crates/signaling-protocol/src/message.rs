//! Signaling message types.

use common::types::{ClientId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action names as they appear in the `action` field.
pub mod action {
    /// Client asks to join a room.
    pub const JOIN: &str = "join";
    /// Client asks to leave a room (and its tracked subscriptions).
    pub const LEAVE: &str = "leave";
    /// Client sends a session description to a peer.
    pub const RELAY_SDP: &str = "relay-sdp";
    /// Client sends an ICE candidate to a peer.
    pub const RELAY_ICE: &str = "relay-ice";
    /// Server introduces a peer.
    pub const ADD_PEER: &str = "add-peer";
    /// Server forwards a session description.
    pub const SESSION_DESCRIPTION: &str = "session-description";
    /// Server forwards an ICE candidate.
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    /// Server announces that a peer is gone.
    pub const REMOVE_PEER: &str = "remove-peer";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub room_id: RoomId,
}

/// `roomId` is optional: a bare `leave` only drops tracked subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySdpPayload {
    /// Target peer.
    pub peer_id: ClientId,
    pub session_description: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayIcePayload {
    /// Target peer.
    pub peer_id: ClientId,
    pub ice_candidate: Value,
}

/// Inbound (client → server) messages.
///
/// Decoding goes through [`crate::codec::decode_client_message`] so that an
/// unknown action can be told apart from a malformed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join(JoinPayload),
    Leave(LeavePayload),
    RelaySdp(RelaySdpPayload),
    RelayIce(RelayIcePayload),
}

impl ClientMessage {
    /// Wire name of this message's action. Bounded, safe as a metric label.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            ClientMessage::Join(_) => action::JOIN,
            ClientMessage::Leave(_) => action::LEAVE,
            ClientMessage::RelaySdp(_) => action::RELAY_SDP,
            ClientMessage::RelayIce(_) => action::RELAY_ICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPeerPayload {
    pub peer_id: ClientId,
    /// True when the receiver is expected to create the WebRTC offer.
    pub create_offer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptionPayload {
    /// Sender of the description.
    pub peer_id: ClientId,
    pub session_description: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    /// Sender of the candidate.
    pub peer_id: ClientId,
    pub ice_candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePeerPayload {
    pub peer_id: ClientId,
}

/// Outbound (server → client) signaling messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    AddPeer(AddPeerPayload),
    SessionDescription(SessionDescriptionPayload),
    IceCandidate(IceCandidatePayload),
    RemovePeer(RemovePeerPayload),
}

impl ServerMessage {
    /// `add-peer` for `peer_id`.
    #[must_use]
    pub fn add_peer(peer_id: ClientId, create_offer: bool) -> Self {
        ServerMessage::AddPeer(AddPeerPayload {
            peer_id,
            create_offer,
        })
    }

    /// `remove-peer` for `peer_id`.
    #[must_use]
    pub fn remove_peer(peer_id: ClientId) -> Self {
        ServerMessage::RemovePeer(RemovePeerPayload { peer_id })
    }

    /// Wire name of this message's action.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            ServerMessage::AddPeer(_) => action::ADD_PEER,
            ServerMessage::SessionDescription(_) => action::SESSION_DESCRIPTION,
            ServerMessage::IceCandidate(_) => action::ICE_CANDIDATE,
            ServerMessage::RemovePeer(_) => action::REMOVE_PEER,
        }
    }

    /// The peer this message is about.
    #[must_use]
    pub fn peer_id(&self) -> &ClientId {
        match self {
            ServerMessage::AddPeer(p) => &p.peer_id,
            ServerMessage::SessionDescription(p) => &p.peer_id,
            ServerMessage::IceCandidate(p) => &p.peer_id,
            ServerMessage::RemovePeer(p) => &p.peer_id,
        }
    }
}

/// Informational frame published to a room's subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAnnouncement {
    /// Always `"server"` for relay-originated announcements.
    pub user: String,
    pub message: String,
}

impl RoomAnnouncement {
    /// Sender name used for relay-originated announcements.
    pub const SERVER_USER: &'static str = "server";

    /// Announcement that `client_id` joined.
    #[must_use]
    pub fn joined(client_id: &ClientId) -> Self {
        Self {
            user: Self::SERVER_USER.to_string(),
            message: format!("{client_id} joined!"),
        }
    }
}

/// Anything the relay writes to a socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Signal(ServerMessage),
    Announcement(RoomAnnouncement),
}

impl ServerFrame {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            ServerFrame::Signal(message) => message.action(),
            ServerFrame::Announcement(_) => "announcement",
        }
    }
}

impl From<ServerMessage> for ServerFrame {
    fn from(message: ServerMessage) -> Self {
        ServerFrame::Signal(message)
    }
}

impl From<RoomAnnouncement> for ServerFrame {
    fn from(announcement: RoomAnnouncement) -> Self {
        ServerFrame::Announcement(announcement)
    }
}
