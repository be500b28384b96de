//! Relay actor flows driven through real connection actors.
//!
//! Each peer is a `ConnectionActor` writing into a captured socket, so these
//! tests see exactly the frames a browser would receive, without a network.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::{ClientId, ConnectionId};
use relay_test_utils::{captured_socket, fixtures, CapturedSocket, SILENCE};
use signaling_protocol::{
    ClientMessage, IceCandidatePayload, RoomAnnouncement, ServerFrame, ServerMessage,
    SessionDescriptionPayload,
};
use signaling_relay::actors::{
    ActorMetrics, ConnectionActor, RelayActorHandle, RelayStatus,
};
use signaling_relay::errors::RelayError;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BUFFER: usize = 64;

struct Harness {
    relay: RelayActorHandle,
    metrics: Arc<ActorMetrics>,
}

struct Peer {
    client_id: ClientId,
    connection_id: ConnectionId,
    socket: CapturedSocket,
}

impl Harness {
    fn new() -> Self {
        let metrics = ActorMetrics::new();
        let relay = RelayActorHandle::new("relay-flows".to_string(), BUFFER, Arc::clone(&metrics));
        Self { relay, metrics }
    }

    async fn connect(&self, name: &str) -> Peer {
        let (sink, socket) = captured_socket();
        let (handle, _task) = ConnectionActor::spawn(
            ClientId::from(name),
            sink,
            BUFFER,
            self.relay.child_token(),
            Arc::clone(&self.metrics),
        );
        let connection_id = handle.connection_id();
        self.relay.connect(handle).await.unwrap();
        Peer {
            client_id: ClientId::from(name),
            connection_id,
            socket,
        }
    }

    async fn send(&self, peer: &Peer, message: ClientMessage) {
        self.relay
            .inbound(
                peer.client_id.clone(),
                peer.connection_id,
                message,
                Instant::now(),
            )
            .await
            .unwrap();
    }

    async fn disconnect(&self, peer: &Peer) {
        self.relay
            .disconnect(peer.client_id.clone(), peer.connection_id)
            .await
            .unwrap();
    }

    /// Status after everything sent so far has been processed.
    async fn status(&self) -> RelayStatus {
        self.relay.get_status().await.unwrap()
    }
}

fn add_peer(peer: &str, create_offer: bool) -> ServerFrame {
    ServerMessage::add_peer(ClientId::from(peer), create_offer).into()
}

fn remove_peer(peer: &str) -> ServerFrame {
    ServerMessage::remove_peer(ClientId::from(peer)).into()
}

fn joined(peer: &str) -> ServerFrame {
    RoomAnnouncement::joined(&ClientId::from(peer)).into()
}

fn names(members: &[ClientId]) -> Vec<&str> {
    members.iter().map(ClientId::as_str).collect()
}

#[tokio::test]
async fn test_two_peer_session_lifecycle() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;

    harness.send(&alice, fixtures::join("r1")).await;
    assert_eq!(names(harness.status().await.members_of("r1")), vec!["alice"]);
    alice.socket.expect_silence(SILENCE).await;

    harness.send(&bob, fixtures::join("r1")).await;
    assert_eq!(
        alice.socket.next_frames(2).await,
        vec![add_peer("bob", false), joined("bob")]
    );
    assert_eq!(bob.socket.next_frame().await, add_peer("alice", true));

    let offer = fixtures::sample_offer();
    harness
        .send(&bob, fixtures::relay_sdp("alice", offer.clone()))
        .await;
    assert_eq!(
        alice.socket.next_frame().await,
        ServerMessage::SessionDescription(SessionDescriptionPayload {
            peer_id: ClientId::from("bob"),
            session_description: offer,
        })
        .into()
    );

    let answer = fixtures::sample_answer();
    harness
        .send(&alice, fixtures::relay_sdp("bob", answer.clone()))
        .await;
    assert_eq!(
        bob.socket.next_frame().await,
        ServerMessage::SessionDescription(SessionDescriptionPayload {
            peer_id: ClientId::from("alice"),
            session_description: answer,
        })
        .into()
    );

    let candidate = fixtures::sample_candidate();
    harness
        .send(&alice, fixtures::relay_ice("bob", candidate.clone()))
        .await;
    assert_eq!(
        bob.socket.next_frame().await,
        ServerMessage::IceCandidate(IceCandidatePayload {
            peer_id: ClientId::from("alice"),
            ice_candidate: candidate,
        })
        .into()
    );

    harness.disconnect(&bob).await;
    assert_eq!(alice.socket.next_frame().await, remove_peer("bob"));

    let status = harness.status().await;
    assert_eq!(status.connection_count, 1);
    assert_eq!(names(status.members_of("r1")), vec!["alice"]);
}

#[tokio::test]
async fn test_join_pairs_with_every_existing_member() {
    let harness = Harness::new();
    let mut existing = Vec::new();
    for name in ["a", "b", "c"] {
        let peer = harness.connect(name).await;
        harness.send(&peer, fixtures::join("mesh")).await;
        existing.push(peer);
    }
    harness.status().await;
    for peer in &mut existing {
        peer.socket.drain().await;
    }

    let mut dave = harness.connect("dave").await;
    harness.send(&dave, fixtures::join("mesh")).await;

    let mut offers = dave.socket.next_frames(3).await;
    offers.sort_by_key(|frame| match frame {
        ServerFrame::Signal(message) => message.peer_id().to_string(),
        ServerFrame::Announcement(_) => String::new(),
    });
    assert_eq!(
        offers,
        vec![add_peer("a", true), add_peer("b", true), add_peer("c", true)]
    );
    dave.socket.expect_silence(SILENCE).await;

    for peer in &mut existing {
        assert_eq!(
            peer.socket.next_frames(2).await,
            vec![add_peer("dave", false), joined("dave")]
        );
    }

    assert_eq!(
        names(harness.status().await.members_of("mesh")),
        vec!["a", "b", "c", "dave"]
    );
}

#[tokio::test]
async fn test_duplicate_join_changes_nothing() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;

    harness.send(&alice, fixtures::join("r1")).await;
    harness.send(&bob, fixtures::join("r1")).await;
    alice.socket.next_frames(2).await;
    bob.socket.next_frame().await;

    harness.send(&bob, fixtures::join("r1")).await;
    let status = harness.status().await;

    alice.socket.expect_silence(SILENCE).await;
    bob.socket.expect_silence(SILENCE).await;
    assert_eq!(names(status.members_of("r1")), vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_leave_notifies_remaining_members_only() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;

    harness.send(&alice, fixtures::join("r1")).await;
    harness.send(&bob, fixtures::join("r1")).await;
    alice.socket.next_frames(2).await;
    bob.socket.next_frame().await;

    harness.send(&bob, fixtures::leave("r1")).await;
    assert_eq!(alice.socket.next_frame().await, remove_peer("bob"));
    bob.socket.expect_silence(SILENCE).await;

    // Leaving again is a no-op.
    harness.send(&bob, fixtures::leave("r1")).await;
    harness.status().await;
    alice.socket.expect_silence(SILENCE).await;

    let status = harness.status().await;
    assert_eq!(names(status.members_of("r1")), vec!["alice"]);
    assert_eq!(status.connection_count, 2);
}

#[tokio::test]
async fn test_leave_without_room_leaves_every_room() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;

    for room in ["r1", "r2"] {
        harness.send(&alice, fixtures::join(room)).await;
        harness.send(&bob, fixtures::join(room)).await;
    }
    alice.socket.next_frames(4).await;
    bob.socket.next_frames(2).await;

    harness.send(&bob, fixtures::leave_all()).await;
    assert_eq!(
        alice.socket.next_frames(2).await,
        vec![remove_peer("bob"), remove_peer("bob")]
    );

    let status = harness.status().await;
    assert_eq!(names(status.members_of("r1")), vec!["alice"]);
    assert_eq!(names(status.members_of("r2")), vec!["alice"]);
}

#[tokio::test]
async fn test_relay_to_unknown_peer_is_dropped() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;

    harness
        .send(&alice, fixtures::relay_sdp("ghost", fixtures::sample_offer()))
        .await;
    let status = harness.status().await;

    alice.socket.expect_silence(SILENCE).await;
    assert_eq!(status.connection_count, 1);
}

#[tokio::test]
async fn test_relay_needs_no_shared_room() {
    let harness = Harness::new();
    let alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;

    let candidate = fixtures::sample_candidate();
    harness
        .send(&alice, fixtures::relay_ice("bob", candidate.clone()))
        .await;

    assert_eq!(
        bob.socket.next_frame().await,
        ServerMessage::IceCandidate(IceCandidatePayload {
            peer_id: ClientId::from("alice"),
            ice_candidate: candidate,
        })
        .into()
    );
}

#[tokio::test]
async fn test_reconnect_evicts_previous_connection() {
    let harness = Harness::new();
    let mut bob = harness.connect("bob").await;
    let mut first = harness.connect("alice").await;

    harness.send(&bob, fixtures::join("r1")).await;
    harness.send(&first, fixtures::join("r1")).await;
    assert_eq!(
        bob.socket.next_frames(2).await,
        vec![add_peer("alice", false), joined("alice")]
    );
    first.socket.next_frame().await;

    let mut second = harness.connect("alice").await;
    assert_eq!(first.socket.next_close().await, 4000);
    assert_eq!(bob.socket.next_frame().await, remove_peer("alice"));

    // The evicted socket's reader reports its disconnect late.
    harness.disconnect(&first).await;
    let status = harness.status().await;
    assert_eq!(status.connection_count, 2);
    assert_eq!(names(status.members_of("r1")), vec!["bob"]);

    // Messages from the old connection are ignored.
    harness
        .send(&first, fixtures::relay_sdp("bob", fixtures::sample_offer()))
        .await;
    harness.status().await;
    bob.socket.expect_silence(SILENCE).await;

    // The new connection is fully routable.
    harness
        .send(&bob, fixtures::relay_sdp("alice", fixtures::sample_offer()))
        .await;
    assert!(matches!(
        second.socket.next_frame().await,
        ServerFrame::Signal(ServerMessage::SessionDescription(_))
    ));
}

#[tokio::test]
async fn test_disconnect_cleans_up_every_room() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;
    let mut carol = harness.connect("carol").await;

    harness.send(&carol, fixtures::join("r1")).await;
    harness.send(&alice, fixtures::join("r2")).await;
    harness.send(&carol, fixtures::join("r2")).await;
    harness.send(&bob, fixtures::join("r1")).await;
    harness.send(&bob, fixtures::join("r2")).await;
    harness.status().await;
    for socket in [&mut alice.socket, &mut bob.socket, &mut carol.socket] {
        socket.drain().await;
    }

    harness.disconnect(&carol).await;
    assert_eq!(alice.socket.next_frame().await, remove_peer("carol"));
    assert_eq!(
        bob.socket.next_frames(2).await,
        vec![remove_peer("carol"), remove_peer("carol")]
    );

    let status = harness.status().await;
    assert_eq!(status.connection_count, 2);
    assert_eq!(names(status.members_of("r1")), vec!["bob"]);
    assert_eq!(names(status.members_of("r2")), vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_last_member_leaving_removes_room() {
    let harness = Harness::new();
    let alice = harness.connect("alice").await;

    harness.send(&alice, fixtures::join("solo")).await;
    assert_eq!(harness.status().await.room_count, 1);

    harness.disconnect(&alice).await;
    let status = harness.status().await;
    assert_eq!(status.room_count, 0);
    assert_eq!(status.connection_count, 0);
}

#[tokio::test]
async fn test_shutdown_closes_sockets_and_rejects_new_connections() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut bob = harness.connect("bob").await;

    harness
        .relay
        .shutdown(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(alice.socket.next_close().await, 1001);
    assert_eq!(bob.socket.next_close().await, 1001);

    let (sink, _socket) = captured_socket();
    let (handle, _task) = ConnectionActor::spawn(
        ClientId::from("carol"),
        sink,
        BUFFER,
        harness.relay.child_token(),
        Arc::clone(&harness.metrics),
    );
    let result = harness.relay.connect(handle).await;
    assert!(matches!(
        result,
        Err(RelayError::Draining | RelayError::ChannelClosed(_))
    ));
}
