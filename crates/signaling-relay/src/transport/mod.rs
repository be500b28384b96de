//! WebSocket transport for the signaling relay.
//!
//! The transport owns socket I/O only. Decoded messages go to the
//! `RelayActor`; outbound frames come back through each connection's
//! `ConnectionActor`.

pub mod ws;

pub use ws::{signaling_router, ConnectParams, TransportState};

use crate::errors::RelayError;

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bind a listener, mapping failures to [`RelayError::Bind`].
///
/// # Errors
///
/// Returns [`RelayError::Bind`] if the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, RelayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`RelayError::Server`] if the server stops with an I/O error.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    name: &'static str,
) -> Result<(), RelayError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!(target: "relay.transport.ws", server = name, "Server shutting down");
        })
        .await
        .map_err(|e| RelayError::Server(format!("{name}: {e}")))
}
