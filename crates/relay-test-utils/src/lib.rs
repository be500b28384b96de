//! # Relay Test Utilities
//!
//! Shared test utilities for the signaling relay.
//!
//! ## Modules
//!
//! - `peer` - WebSocket client that speaks the signaling protocol
//! - `capture` - In-memory socket sink for driving connection actors
//! - `fixtures` - Client message builders and sample SDP/ICE payloads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let mut alice = TestPeer::connect(addr, "/api/_ws", "alice").await;
//!     alice.send(&fixtures::join("lobby")).await;
//!     alice.expect_silence(SILENCE).await;
//! }
//! ```

pub mod capture;
pub mod fixtures;
pub mod peer;

pub use capture::{captured_socket, CapturedSocket};
pub use peer::{ws_url, TestPeer};

use std::time::Duration;

/// How long to wait for an expected frame before failing.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait when asserting that nothing arrives.
pub const SILENCE: Duration = Duration::from_millis(150);
