//! WebSocket upgrade handling and the per-connection read loop.
//!
//! `GET <ws_path>?userId=<id>` upgrades to a signaling socket. The client ID
//! is taken from the query string once and never changes for the life of the
//! socket. Requests without a usable `userId` are refused with 400 before any
//! relay state is touched.

use crate::actors::{ActorMetrics, ActorType, ConnectionActor, RelayActorHandle};
use crate::observability::metrics::{self as prom, DropReason};

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::types::ClientId;
use futures::StreamExt;
use serde::Deserialize;
use signaling_protocol::decode_client_message;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state for the signaling router.
#[derive(Clone)]
pub struct TransportState {
    pub relay: RelayActorHandle,
    pub metrics: Arc<ActorMetrics>,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub user_id: Option<String>,
}

impl ConnectParams {
    /// The client ID, if present and not blank.
    #[must_use]
    pub fn client_id(self) -> Option<ClientId> {
        self.user_id.and_then(|raw| ClientId::try_new(raw).ok())
    }
}

/// Router serving the signaling WebSocket at `ws_path`.
pub fn signaling_router(state: TransportState, ws_path: &str) -> Router {
    Router::new()
        .route(ws_path, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(
    State(state): State<TransportState>,
    Query(params): Query<ConnectParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(client_id) = params.client_id() else {
        warn!(
            target: "relay.transport.ws",
            "Rejecting upgrade without userId"
        );
        return (StatusCode::BAD_REQUEST, "userId query parameter is required").into_response();
    };

    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, client_id, state))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// Run one signaling connection from upgrade to close.
async fn handle_socket(socket: WebSocket, client_id: ClientId, state: TransportState) {
    let (sink, mut stream) = socket.split();
    let cancel_token = state.relay.child_token();

    let (handle, writer_task) = ConnectionActor::spawn(
        client_id.clone(),
        sink,
        state.outbound_buffer,
        cancel_token.clone(),
        Arc::clone(&state.metrics),
    );
    let connection_id = handle.connection_id();

    if let Err(e) = state.relay.connect(handle).await {
        warn!(
            target: "relay.transport.ws",
            client_id = %client_id,
            error = %e,
            "Connection rejected"
        );
        cancel_token.cancel();
        await_writer(writer_task, &state.metrics).await;
        return;
    }

    info!(
        target: "relay.transport.ws",
        client_id = %client_id,
        connection_id = %connection_id,
        "WebSocket client connected"
    );

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let received_at = Instant::now();
                        match decode_client_message(&text) {
                            Ok(message) => {
                                if state
                                    .relay
                                    .inbound(client_id.clone(), connection_id, message, received_at)
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(
                                    target: "relay.transport.ws",
                                    client_id = %client_id,
                                    reason = e.reason(),
                                    error = %e,
                                    "Dropping undecodable frame"
                                );
                                prom::record_message_dropped(DropReason::from_codec_reason(
                                    e.reason(),
                                ));
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(
                            target: "relay.transport.ws",
                            client_id = %client_id,
                            len = data.len(),
                            "Dropping binary frame"
                        );
                        prom::record_message_dropped(DropReason::Malformed);
                    }
                    // Pongs are sent by the WebSocket layer.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(
                            target: "relay.transport.ws",
                            client_id = %client_id,
                            error = %e,
                            "WebSocket read failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    cancel_token.cancel();
    if let Err(e) = state.relay.disconnect(client_id.clone(), connection_id).await {
        debug!(
            target: "relay.transport.ws",
            client_id = %client_id,
            error = %e,
            "Relay gone before disconnect"
        );
    }
    await_writer(writer_task, &state.metrics).await;

    info!(
        target: "relay.transport.ws",
        client_id = %client_id,
        connection_id = %connection_id,
        "WebSocket client disconnected"
    );
}

async fn await_writer(task: JoinHandle<()>, metrics: &ActorMetrics) {
    if let Err(e) = task.await {
        if e.is_panic() {
            metrics.record_panic(ActorType::Connection);
        }
    }
}
