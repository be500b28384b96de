//! Codec for encoding and decoding signaling frames.

use crate::message::{
    action, ClientMessage, JoinPayload, LeavePayload, RelayIcePayload, RelaySdpPayload,
    ServerFrame,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Error type for codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame is not a JSON object
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Frame has no string `action` field
    #[error("Missing action")]
    MissingAction,

    /// Action is not one the relay understands
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Payload does not match the action's shape
    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload {
        /// Action whose payload failed to decode
        action: &'static str,
        /// Decoder error
        reason: String,
    },

    /// Serialization failed
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl CodecError {
    /// Short reason label, bounded for use in metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            CodecError::UnknownAction(_) => "unknown_action",
            CodecError::InvalidJson(_)
            | CodecError::MissingAction
            | CodecError::InvalidPayload { .. }
            | CodecError::Encode(_) => "malformed",
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    action: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// Decode a client → server text frame.
///
/// # Errors
///
/// Returns [`CodecError::UnknownAction`] for a well-formed envelope with an
/// unrecognised action, and one of the other variants for anything malformed.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, CodecError> {
    let envelope: RawEnvelope =
        serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;

    let name = envelope.action.ok_or(CodecError::MissingAction)?;
    let payload = envelope.payload;

    match name.as_str() {
        action::JOIN => payload_as::<JoinPayload>(action::JOIN, payload).map(ClientMessage::Join),
        action::LEAVE => {
            if payload.is_null() {
                return Ok(ClientMessage::Leave(LeavePayload::default()));
            }
            payload_as::<LeavePayload>(action::LEAVE, payload).map(ClientMessage::Leave)
        }
        action::RELAY_SDP => {
            payload_as::<RelaySdpPayload>(action::RELAY_SDP, payload).map(ClientMessage::RelaySdp)
        }
        action::RELAY_ICE => {
            payload_as::<RelayIcePayload>(action::RELAY_ICE, payload).map(ClientMessage::RelayIce)
        }
        _ => Err(CodecError::UnknownAction(name)),
    }
}

fn payload_as<T: DeserializeOwned>(action: &'static str, payload: Value) -> Result<T, CodecError> {
    serde_json::from_value(payload).map_err(|e| CodecError::InvalidPayload {
        action,
        reason: e.to_string(),
    })
}

/// Encode a client → server message.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_client_message(message: &ClientMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Encode a server → client frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a server → client frame.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if the text is neither a signaling
/// message nor a room announcement.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))
}
