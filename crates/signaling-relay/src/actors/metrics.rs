//! Actor metrics and mailbox monitoring.
//!
//! Mailbox depth is the number of messages still queued behind the one being
//! handled, sampled each time an actor takes a message off its channel.
//!
//! | Actor Type | Normal | Warning | Critical |
//! |------------|--------|---------|----------|
//! | Relay      | < 100  | 100-500 | > 500    |
//! | Connection | < 50   | 50-150  | > 150    |
//!
//! Relay samples are mirrored to `relay_actor_mailbox_depth{actor_type}`.

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for the relay actor.
pub const RELAY_MAILBOX_NORMAL: usize = 100;
pub const RELAY_MAILBOX_WARNING: usize = 500;

/// Mailbox depth thresholds for connection actors. Kept below the default
/// outbound buffer so a saturated queue reaches the critical level.
pub const CONNECTION_MAILBOX_NORMAL: usize = 50;
pub const CONNECTION_MAILBOX_WARNING: usize = 150;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `RelayActor` (singleton).
    Relay,
    /// `ConnectionActor` (one per WebSocket).
    Connection,
}

impl ActorType {
    /// Returns the actor type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Relay => "relay",
            ActorType::Connection => "connection",
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Relay => RELAY_MAILBOX_WARNING,
            ActorType::Connection => CONNECTION_MAILBOX_WARNING,
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Relay => RELAY_MAILBOX_NORMAL,
            ActorType::Connection => CONNECTION_MAILBOX_NORMAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks the backlog of one actor's mailbox.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Instance ID for the relay, connection ID for connections.
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record the number of messages still queued, typically
    /// `receiver.len()` right after a `recv()`.
    pub fn record_depth(&self, queued: usize) {
        let previous = self.depth.swap(queued, Ordering::Relaxed);
        self.peak_depth.fetch_max(queued, Ordering::Relaxed);

        if self.actor_type == ActorType::Relay {
            prom::set_actor_mailbox_depth(self.actor_type.as_str(), queued);
        }

        let level = self.level_for_depth(queued);
        if level <= self.level_for_depth(previous) {
            return;
        }
        match level {
            MailboxLevel::Critical => warn!(
                target: "relay.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = queued,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            ),
            MailboxLevel::Warning => debug!(
                target: "relay.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = queued,
                "Mailbox depth elevated"
            ),
            MailboxLevel::Normal => {}
        }
    }

    /// Record a message finished processing.
    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Deepest backlog seen since the actor started.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth >= self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Counters shared by the relay actor and every connection actor.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Connection actors currently running.
    active_connections: AtomicUsize,
    /// Frames written to sockets.
    frames_sent: AtomicU64,
    /// Actor panics (indicates bugs).
    actor_panics: AtomicU64,
    /// Deepest outbound backlog any connection actor has seen.
    peak_outbound_depth: AtomicUsize,
}

impl ActorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connection_created(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection actor exiting, with the peak of its outbound queue.
    pub fn connection_closed(&self, peak_outbound_depth: usize) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.peak_outbound_depth
            .fetch_max(peak_outbound_depth, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an actor panic.
    pub fn record_panic(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            target: "relay.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_outbound_depth(&self) -> usize {
        self.peak_outbound_depth.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_as_str() {
        assert_eq!(ActorType::Relay.as_str(), "relay");
        assert_eq!(ActorType::Connection.as_str(), "connection");
    }

    #[test]
    fn test_mailbox_monitor_tracks_backlog_and_peak() {
        let monitor = MailboxMonitor::new(ActorType::Relay, "relay-test");
        assert_eq!(monitor.current_depth(), 0);

        monitor.record_depth(42);
        monitor.record_processed();
        assert_eq!(monitor.current_depth(), 42);
        assert_eq!(monitor.peak_depth(), 42);

        monitor.record_depth(3);
        monitor.record_processed();
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 42);
        assert_eq!(monitor.messages_processed(), 2);
    }

    #[test]
    fn test_relay_levels() {
        let monitor = MailboxMonitor::new(ActorType::Relay, "relay-test");

        assert_eq!(monitor.level_for_depth(0), MailboxLevel::Normal);
        assert_eq!(monitor.level_for_depth(99), MailboxLevel::Normal);
        assert_eq!(monitor.level_for_depth(150), MailboxLevel::Warning);
        assert_eq!(monitor.level_for_depth(500), MailboxLevel::Warning);
        assert_eq!(monitor.level_for_depth(501), MailboxLevel::Critical);
    }

    #[test]
    fn test_connection_levels_reachable_within_default_buffer() {
        let monitor = MailboxMonitor::new(ActorType::Connection, "conn-456");

        assert_eq!(monitor.level_for_depth(49), MailboxLevel::Normal);
        assert_eq!(monitor.level_for_depth(75), MailboxLevel::Warning);
        assert_eq!(
            monitor.level_for_depth(crate::config::DEFAULT_OUTBOUND_BUFFER - 1),
            MailboxLevel::Critical
        );
    }

    #[test]
    fn test_actor_metrics_counts() {
        let metrics = ActorMetrics::new();

        metrics.connection_created();
        metrics.connection_created();
        metrics.connection_closed(7);
        assert_eq!(metrics.connection_count(), 1);
        assert_eq!(metrics.peak_outbound_depth(), 7);

        metrics.connection_closed(2);
        assert_eq!(metrics.peak_outbound_depth(), 7);

        metrics.record_frame_sent();
        assert_eq!(metrics.frames_sent(), 1);

        metrics.record_panic(ActorType::Connection);
        assert_eq!(metrics.panic_count(), 1);
    }
}
