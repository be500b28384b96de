//! Actor model for the signaling relay.
//!
//! ```text
//! RelayActor (singleton per relay instance)
//! ├── owns SignalingState (connection registry + room directory)
//! └── holds a handle to each ConnectionActor
//!     └── ConnectionActor (one per WebSocket, owns the write half)
//! ```
//!
//! - **CancellationToken propagation**: connection actors run on child tokens
//!   of the relay's root token, so shutdown reaches every socket
//! - **Mailbox monitoring**: depth thresholds (Relay: 100/500, Connection: 50/200)
//! - **Message passing**: transport to relay over a bounded `mpsc`, relay to
//!   connections with non-blocking `try_send`

pub mod connection;
pub mod messages;
pub mod metrics;
pub mod relay;

// Re-export primary types
pub use connection::{ConnectionActor, ConnectionActorHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use relay::{RelayActor, RelayActorHandle};
