//! Signaling protocol for the WebRTC relay.
//!
//! Every frame exchanged over the signaling socket is a JSON text message
//! with two fields, `action` and `payload`:
//!
//! ```text
//! { "action": "relay-sdp", "payload": { "peerId": "bob", "sessionDescription": { ... } } }
//! ```
//!
//! Clients send `join`, `leave`, `relay-sdp` and `relay-ice`. The server sends
//! `add-peer`, `remove-peer`, `session-description` and `ice-candidate`, plus a
//! room announcement frame (`{ "user": "server", "message": "..." }`) when a
//! peer joins a room.
//!
//! Session descriptions and ICE candidates are opaque to the relay and are
//! carried as raw JSON values.

#![warn(clippy::pedantic)]

pub mod codec;
pub mod message;

pub use codec::{
    decode_client_message, decode_server_frame, encode_client_message, encode_server_frame,
    CodecError,
};
pub use message::{
    action, AddPeerPayload, ClientMessage, IceCandidatePayload, JoinPayload, LeavePayload,
    RelayIcePayload, RelaySdpPayload, RemovePeerPayload, RoomAnnouncement, ServerFrame,
    ServerMessage, SessionDescriptionPayload,
};
