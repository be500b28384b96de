//! In-memory signaling state.
//!
//! Owned by the `RelayActor`; nothing here is shared across tasks.

pub mod directory;
pub mod registry;
pub mod signaling;

pub use directory::{JoinOutcome, RoomDirectory};
pub use registry::{ConnectionRegistry, RegisteredConnection};
pub use signaling::{
    ConnectOutcome, DisconnectOutcome, InboundOutcome, LeaveSummary, RelayOutcome,
    SignalingState,
};
