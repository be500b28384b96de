//! Signaling Relay
//!
//! WebSocket signaling server for browser-to-browser WebRTC sessions.
//!
//! # Servers
//!
//! - WebSocket server for client signaling (default: 0.0.0.0:5173, `/api/_ws`)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (text or JSON)
//! 3. Initialize Prometheus metrics recorder
//! 4. Spawn the `RelayActor`
//! 5. Start health HTTP server (liveness, readiness, metrics)
//! 6. Bind and start the WebSocket server, then report ready
//! 7. Wait for shutdown signal or a fatal server error
//! 8. Drain the relay, then stop the servers

#![warn(clippy::pedantic)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::config::LogFormat;
use signaling_relay::actors::{ActorMetrics, ActorType, RelayActorHandle};
use signaling_relay::config::Config;
use signaling_relay::errors::RelayError;
use signaling_relay::observability::metrics::{init_metrics_recorder, metrics_router};
use signaling_relay::observability::{health_router, HealthState};
use signaling_relay::transport::{self, signaling_router, TransportState};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time allowed past the drain deadline for tasks to finish.
const RELAY_STOP_MARGIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration comes first because it selects the log format.
    let config = Config::from_env().map_err(RelayError::from)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.log_filter.clone().into());
    match config.observability.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!("Starting Signaling Relay");
    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        ws_path = %config.ws_path,
        health_bind_address = %config.health_bind_address,
        outbound_buffer = config.outbound_buffer,
        mailbox_buffer = config.mailbox_buffer,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    let actor_metrics = ActorMetrics::new();
    let (relay, relay_task) = RelayActorHandle::spawn(
        config.instance_id.clone(),
        config.mailbox_buffer,
        Arc::clone(&actor_metrics),
    );
    info!("Relay actor started");

    // Servers stop when the relay's root token is cancelled
    let shutdown_token = relay.child_token();
    // Cancelled by a server task that stops with a fatal error
    let server_failed = CancellationToken::new();

    // Health server (MUST succeed - fail startup if it doesn't)
    let health_app =
        health_router(Arc::clone(&health_state)).merge(metrics_router(prometheus_handle));

    let health_listener = transport::bind(config.health_bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to bind health server");
            e
        })?;
    info!(addr = %config.health_bind_address, "Health server bound successfully");

    let health_task = spawn_server(
        "health",
        transport::serve(
            health_listener,
            health_app,
            shutdown_token.child_token(),
            "health",
        ),
        server_failed.clone(),
    );

    // WebSocket server
    let ws_state = TransportState {
        relay: relay.clone(),
        metrics: Arc::clone(&actor_metrics),
        outbound_buffer: config.outbound_buffer,
    };
    let ws_app = signaling_router(ws_state, &config.ws_path);

    let ws_listener = transport::bind(config.bind_address).await.map_err(|e| {
        error!(error = %e, "Failed to bind signaling server");
        e
    })?;
    info!(addr = %config.bind_address, path = %config.ws_path, "Signaling server bound successfully");

    let ws_task = spawn_server(
        "signaling",
        transport::serve(ws_listener, ws_app, shutdown_token.child_token(), "signaling"),
        server_failed.clone(),
    );

    health_state.begin_serving();
    info!("Signaling Relay running - press Ctrl+C to shutdown");

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, initiating graceful shutdown...");
        }
        () = server_failed.cancelled() => {
            error!("Server stopped unexpectedly, initiating graceful shutdown...");
        }
    }

    // /ready flips to 503 before the relay starts closing sockets
    health_state.begin_draining();
    debug!(phase = health_state.phase().as_str(), "Readiness withdrawn");

    match relay.get_status().await {
        Ok(status) => info!(
            connections = status.connection_count,
            rooms = status.room_count,
            peak_mailbox_depth = status.peak_mailbox_depth,
            "Relay status at shutdown"
        ),
        Err(e) => warn!(error = %e, "Relay status unavailable"),
    }

    // Cancels the root token, which also stops both servers
    let grace = Duration::from_secs(config.shutdown_grace_seconds);
    if let Err(e) = relay.shutdown(grace).await {
        warn!(error = %e, "Relay shutdown error");
    }

    // The actor enforces `grace` itself; the margin covers its final bookkeeping.
    match tokio::time::timeout(grace + RELAY_STOP_MARGIN, relay_task).await {
        Ok(Ok(())) => info!("Relay drained"),
        Ok(Err(e)) => {
            error!(error = %e, "Relay actor task failed");
            if e.is_panic() {
                actor_metrics.record_panic(ActorType::Relay);
            }
        }
        Err(_) => warn!("Relay did not finish draining in time"),
    }

    for (name, task) in [("signaling", ws_task), ("health", health_task)] {
        if tokio::time::timeout(RELAY_STOP_MARGIN, task).await.is_err() {
            warn!(server = name, "Server did not stop in time");
        }
    }

    info!(
        frames_sent = actor_metrics.frames_sent(),
        writers_remaining = actor_metrics.connection_count(),
        peak_outbound_depth = actor_metrics.peak_outbound_depth(),
        actor_panics = actor_metrics.panic_count(),
        "Signaling Relay shutdown complete"
    );

    if server_failed.is_cancelled() {
        return Err(RelayError::Server("a server stopped unexpectedly".to_string()).into());
    }
    Ok(())
}

/// Run a server future, signalling `failed` if it stops with a fatal error.
fn spawn_server(
    name: &'static str,
    server: impl Future<Output = Result<(), RelayError>> + Send + 'static,
    failed: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(server = name, error = %e, fatal = e.is_fatal(), "Server failed");
            if e.is_fatal() {
                failed.cancel();
            }
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
