//! End-to-end tests against a real listener using a WebSocket client.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use common::types::ClientId;
use relay_test_utils::{fixtures, ws_url, TestPeer, SILENCE};
use signaling_protocol::{
    RoomAnnouncement, ServerFrame, ServerMessage, SessionDescriptionPayload,
};
use signaling_relay::actors::{ActorMetrics, RelayActorHandle, RelayStatus};
use signaling_relay::transport::{self, signaling_router, TransportState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite;

const WS_PATH: &str = "/api/_ws";
const TIMEOUT: Duration = Duration::from_secs(5);

struct TestRelay {
    addr: SocketAddr,
    relay: RelayActorHandle,
}

impl TestRelay {
    /// Boot a relay on an ephemeral port.
    async fn start() -> Self {
        let metrics = ActorMetrics::new();
        let relay = RelayActorHandle::new("relay-e2e".to_string(), 256, Arc::clone(&metrics));

        let listener = transport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let router = signaling_router(
            TransportState {
                relay: relay.clone(),
                metrics,
                outbound_buffer: 64,
            },
            WS_PATH,
        );
        tokio::spawn(transport::serve(
            listener,
            router,
            relay.child_token(),
            "signaling",
        ));

        Self { addr, relay }
    }

    async fn peer(&self, user_id: &str) -> TestPeer {
        TestPeer::connect(self.addr, WS_PATH, user_id).await
    }

    /// Poll relay status until `condition` holds.
    async fn wait_for(&self, condition: impl Fn(&RelayStatus) -> bool) -> RelayStatus {
        timeout(TIMEOUT, async {
            loop {
                let status = self.relay.get_status().await.unwrap();
                if condition(&status) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("relay never reached expected state")
    }

    async fn wait_for_members(&self, room: &str, expected: &[&str]) -> RelayStatus {
        self.wait_for(|status| {
            status
                .members_of(room)
                .iter()
                .map(ClientId::as_str)
                .eq(expected.iter().copied())
        })
        .await
    }
}

fn add_peer(peer: &str, create_offer: bool) -> ServerFrame {
    ServerMessage::add_peer(ClientId::from(peer), create_offer).into()
}

fn remove_peer(peer: &str) -> ServerFrame {
    ServerMessage::remove_peer(ClientId::from(peer)).into()
}

async fn assert_rejected_with_400(url: &str) {
    match TestPeer::try_connect(url).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 400),
        other => panic!("expected HTTP 400 for {url}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_signaling_session() {
    let server = TestRelay::start().await;
    let mut alice = server.peer("alice").await;
    let mut bob = server.peer("bob").await;
    server.wait_for(|s| s.connection_count == 2).await;

    alice.send(&fixtures::join("r1")).await;
    server.wait_for_members("r1", &["alice"]).await;

    bob.send(&fixtures::join("r1")).await;
    assert_eq!(
        alice.recv_n(2).await,
        vec![
            add_peer("bob", false),
            RoomAnnouncement::joined(&ClientId::from("bob")).into(),
        ]
    );
    assert_eq!(bob.recv().await, add_peer("alice", true));

    let offer = fixtures::sample_offer();
    bob.send(&fixtures::relay_sdp("alice", offer.clone())).await;
    assert_eq!(
        alice.recv().await,
        ServerMessage::SessionDescription(SessionDescriptionPayload {
            peer_id: ClientId::from("bob"),
            session_description: offer,
        })
        .into()
    );

    alice
        .send(&fixtures::relay_sdp("bob", fixtures::sample_answer()))
        .await;
    assert!(matches!(
        bob.recv().await,
        ServerFrame::Signal(ServerMessage::SessionDescription(ref p)) if p.peer_id.as_str() == "alice"
    ));

    bob.send(&fixtures::relay_ice("alice", fixtures::sample_candidate()))
        .await;
    assert!(matches!(
        alice.recv().await,
        ServerFrame::Signal(ServerMessage::IceCandidate(ref p)) if p.peer_id.as_str() == "bob"
    ));

    bob.close().await;
    assert_eq!(alice.recv().await, remove_peer("bob"));

    let status = server.wait_for(|s| s.connection_count == 1).await;
    assert_eq!(status.members_of("r1"), &[ClientId::from("alice")]);
}

#[tokio::test]
async fn test_upgrade_without_user_id_is_rejected() {
    let server = TestRelay::start().await;

    assert_rejected_with_400(&format!("ws://{}{WS_PATH}", server.addr)).await;
    assert_rejected_with_400(&ws_url(server.addr, WS_PATH, "")).await;

    let status = server.relay.get_status().await.unwrap();
    assert_eq!(status.connection_count, 0);
}

#[tokio::test]
async fn test_bad_frames_keep_connection_open() {
    let server = TestRelay::start().await;
    let mut alice = server.peer("alice").await;
    let mut bob = server.peer("bob").await;

    alice.send_text("not json at all").await;
    alice
        .send_text(r#"{"action":"dance","payload":{}}"#)
        .await;
    alice
        .send_text(r#"{"action":"join","payload":{"roomName":"r1"}}"#)
        .await;
    alice.send_binary(vec![0xde, 0xad, 0xbe, 0xef]).await;
    alice.expect_silence(SILENCE).await;

    alice.send(&fixtures::join("r1")).await;
    server.wait_for_members("r1", &["alice"]).await;

    bob.send(&fixtures::join("r1")).await;
    assert_eq!(alice.recv().await, add_peer("bob", false));
}

#[tokio::test]
async fn test_relay_to_unknown_peer_is_silent() {
    let server = TestRelay::start().await;
    let mut alice = server.peer("alice").await;

    alice
        .send(&fixtures::relay_ice("nobody", fixtures::sample_candidate()))
        .await;
    alice.expect_silence(SILENCE).await;

    let status = server.wait_for(|s| s.connection_count == 1).await;
    assert_eq!(status.room_count, 0);
}

#[tokio::test]
async fn test_reconnect_replaces_previous_socket() {
    let server = TestRelay::start().await;
    let mut bob = server.peer("bob").await;
    let mut first = server.peer("alice").await;

    bob.send(&fixtures::join("r1")).await;
    server.wait_for_members("r1", &["bob"]).await;
    first.send(&fixtures::join("r1")).await;
    bob.recv_n(2).await;
    first.recv().await;

    let mut second = server.peer("alice").await;
    assert_eq!(first.expect_close().await, 4000);
    assert_eq!(bob.recv().await, remove_peer("alice"));

    let status = server.wait_for_members("r1", &["bob"]).await;
    assert_eq!(status.connection_count, 2);

    bob.send(&fixtures::relay_sdp("alice", fixtures::sample_offer()))
        .await;
    assert!(matches!(
        second.recv().await,
        ServerFrame::Signal(ServerMessage::SessionDescription(ref p)) if p.peer_id.as_str() == "bob"
    ));
}

#[tokio::test]
async fn test_shutdown_closes_every_socket() {
    let server = TestRelay::start().await;
    let mut alice = server.peer("alice").await;
    let mut bob = server.peer("bob").await;
    server.wait_for(|s| s.connection_count == 2).await;

    server.relay.shutdown(Duration::from_secs(2)).await.unwrap();

    assert_eq!(alice.expect_close().await, 1001);
    assert_eq!(bob.expect_close().await, 1001);
}
