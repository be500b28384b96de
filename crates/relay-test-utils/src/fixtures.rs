//! Client message builders and sample payloads.

use serde_json::{json, Value};
use signaling_protocol::{
    ClientMessage, JoinPayload, LeavePayload, RelayIcePayload, RelaySdpPayload,
};

#[must_use]
pub fn join(room_id: &str) -> ClientMessage {
    ClientMessage::Join(JoinPayload {
        room_id: room_id.into(),
    })
}

#[must_use]
pub fn leave(room_id: &str) -> ClientMessage {
    ClientMessage::Leave(LeavePayload {
        room_id: Some(room_id.into()),
    })
}

/// `leave` without a room: leaves every subscribed room.
#[must_use]
pub fn leave_all() -> ClientMessage {
    ClientMessage::Leave(LeavePayload { room_id: None })
}

#[must_use]
pub fn relay_sdp(peer_id: &str, session_description: Value) -> ClientMessage {
    ClientMessage::RelaySdp(RelaySdpPayload {
        peer_id: peer_id.into(),
        session_description,
    })
}

#[must_use]
pub fn relay_ice(peer_id: &str, ice_candidate: Value) -> ClientMessage {
    ClientMessage::RelayIce(RelayIcePayload {
        peer_id: peer_id.into(),
        ice_candidate,
    })
}

/// A browser-shaped SDP offer.
#[must_use]
pub fn sample_offer() -> Value {
    json!({
        "type": "offer",
        "sdp": "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"
    })
}

/// A browser-shaped SDP answer.
#[must_use]
pub fn sample_answer() -> Value {
    json!({
        "type": "answer",
        "sdp": "v=0\r\no=- 1022312203451712345 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"
    })
}

/// A browser-shaped ICE candidate.
#[must_use]
pub fn sample_candidate() -> Value {
    json!({
        "candidate": "candidate:842163049 1 udp 1677729535 192.0.2.7 50000 typ srflx raddr 0.0.0.0 rport 0 generation 0",
        "sdpMid": "0",
        "sdpMLineIndex": 0
    })
}
