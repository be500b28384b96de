//! Prometheus metrics for the signaling relay.
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `action`: the eight protocol actions plus `announcement`
//! - `reason`: the [`DropReason`] variants
//! - `actor_type`: relay, connection
//!
//! Client and room identifiers are never used as labels.

use axum::routing::get;
use axum::Router;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Signaling message latency buckets. Relay work is in-memory, so the
/// interesting range is sub-millisecond to a few milliseconds.
const MESSAGE_LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
];

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("relay_message".to_string()),
            MESSAGE_LATENCY_BUCKETS,
        )
        .map_err(|e| format!("Failed to set message latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Router serving `GET /metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

/// Why a message produced no delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Frame could not be decoded.
    Malformed,
    /// Well-formed envelope with an unrecognised action.
    UnknownAction,
    /// Relay target is not connected.
    UnreachablePeer,
    /// Client joined a room it was already in.
    DuplicateJoin,
    /// Event came from a connection that has been replaced.
    StaleConnection,
    /// Outbound queue was full or closed.
    SendFailed,
}

impl DropReason {
    /// Label value for `relay_messages_dropped_total`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::Malformed => "malformed",
            DropReason::UnknownAction => "unknown_action",
            DropReason::UnreachablePeer => "unreachable_peer",
            DropReason::DuplicateJoin => "duplicate_join",
            DropReason::StaleConnection => "stale_connection",
            DropReason::SendFailed => "send_failed",
        }
    }

    /// Map a codec reason label (see `CodecError::reason`).
    #[must_use]
    pub fn from_codec_reason(reason: &str) -> Self {
        if reason == "unknown_action" {
            DropReason::UnknownAction
        } else {
            DropReason::Malformed
        }
    }
}

// ============================================================================
// Connection & Room Metrics (Gauges)
// ============================================================================

/// Set the number of registered signaling connections.
///
/// Metric: `relay_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_connections_active").set(count as f64);
}

/// Set the number of non-empty rooms.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `relay_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Message Metrics
// ============================================================================

/// Record an inbound message that was decoded and handled.
///
/// Metric: `relay_messages_total`
/// Labels: `action`
pub fn record_message(action: &'static str) {
    counter!("relay_messages_total", "action" => action).increment(1);
}

/// Record a dropped message.
///
/// Metric: `relay_messages_dropped_total`
/// Labels: `reason`
pub fn record_message_dropped(reason: DropReason) {
    counter!("relay_messages_dropped_total", "reason" => reason.as_str()).increment(1);
}

/// Record time from frame receipt to the end of relay processing.
///
/// Metric: `relay_message_latency_seconds`
/// Labels: `action`
pub fn record_message_latency(action: &'static str, duration: Duration) {
    histogram!("relay_message_latency_seconds", "action" => action)
        .record(duration.as_secs_f64());
}

/// Record a connection replaced by a newer one for the same client.
///
/// Metric: `relay_evictions_total`
pub fn record_eviction() {
    counter!("relay_evictions_total").increment(1);
}
