//! WebRTC signaling relay library.
//!
//! Browsers connect over WebSocket with a self-chosen `userId`, join named
//! rooms, and exchange SDP offers/answers and ICE candidates through the
//! relay. The relay never inspects the WebRTC payloads; it only tracks who is
//! connected, who is in which room, and forwards messages to the named peer.
//!
//! # Architecture
//!
//! ```text
//! WebSocket reader task (per socket)
//!   └── decodes frames ──► RelayActor (singleton)
//!                            ├── owns SignalingState
//!                            │   ├── ConnectionRegistry (client ID → connection)
//!                            │   └── RoomDirectory (room ID → members)
//!                            └── queues frames ──► ConnectionActor (per socket)
//!                                                    └── writes to the socket
//! ```
//!
//! # Modules
//!
//! - [`actors`] - relay and connection actors
//! - [`state`] - registry, directory and the signaling state machine
//! - [`transport`] - axum WebSocket endpoint
//! - [`observability`] - health probes and Prometheus metrics
//! - [`config`] - configuration from environment
//! - [`errors`] - error types

#![warn(clippy::pedantic)]

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod state;
pub mod transport;
