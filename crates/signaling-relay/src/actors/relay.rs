//! `RelayActor` - singleton owner of all signaling state.
//!
//! Every connect, disconnect and decoded client message passes through this
//! actor's mailbox and is applied to [`SignalingState`] to completion before
//! the next one is read. That single task is the serialization boundary for
//! the registry and the room directory.
//!
//! # Graceful Shutdown
//!
//! On shutdown the relay:
//! 1. Stops accepting new connections (`Connect` returns `Draining`)
//! 2. Cancels the root `CancellationToken` (propagates to connection actors)
//! 3. Asks every registered connection to close
//! 4. Keeps handling disconnects until the registry is empty or the drain
//!    deadline passes

use crate::errors::RelayError;
use crate::observability::metrics as prom;
use crate::state::{ConnectOutcome, DisconnectOutcome, InboundOutcome, SignalingState};

use super::connection::ConnectionActorHandle;
use super::messages::{CloseReason, RelayMessage, RelayStatus};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::{ClientId, ConnectionId};
use signaling_protocol::ClientMessage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Drain deadline used when the actor is cancelled without a `Shutdown`.
const DEFAULT_DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Handle to the `RelayActor`.
///
/// This is the public interface for the transport and for tests.
#[derive(Clone, Debug)]
pub struct RelayActorHandle {
    sender: mpsc::Sender<RelayMessage>,
    cancel_token: CancellationToken,
}

impl RelayActorHandle {
    /// Spawn the relay actor and return a handle to it.
    #[must_use]
    pub fn new(instance_id: String, mailbox_buffer: usize, metrics: Arc<ActorMetrics>) -> Self {
        Self::spawn(instance_id, mailbox_buffer, metrics).0
    }

    /// Spawn the relay actor, also returning its task handle.
    ///
    /// The task finishes once the actor has drained after [`Self::shutdown`]
    /// or cancellation.
    #[must_use]
    pub fn spawn(
        instance_id: String,
        mailbox_buffer: usize,
        metrics: Arc<ActorMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(mailbox_buffer);
        let cancel_token = CancellationToken::new();

        let actor = RelayActor::new(instance_id, receiver, cancel_token.clone(), metrics);
        let task_handle = tokio::spawn(actor.run());

        (
            Self {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Register an accepted connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Draining`] during shutdown and
    /// [`RelayError::ChannelClosed`] if the actor has stopped.
    pub async fn connect(&self, handle: ConnectionActorHandle) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Connect {
                handle,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::ChannelClosed(format!("relay mailbox: {e}")))?;

        rx.await
            .map_err(|e| RelayError::ChannelClosed(format!("relay reply: {e}")))?
    }

    /// Forward a decoded client message. Does not wait for processing.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if the actor has stopped.
    pub async fn inbound(
        &self,
        client_id: ClientId,
        connection_id: ConnectionId,
        message: ClientMessage,
        received_at: Instant,
    ) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Inbound {
                client_id,
                connection_id,
                message,
                received_at,
            })
            .await
            .map_err(|e| RelayError::ChannelClosed(format!("relay mailbox: {e}")))
    }

    /// Report that a connection's socket closed. Does not wait for processing.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if the actor has stopped.
    pub async fn disconnect(
        &self,
        client_id: ClientId,
        connection_id: ConnectionId,
    ) -> Result<(), RelayError> {
        self.sender
            .send(RelayMessage::Disconnect {
                client_id,
                connection_id,
            })
            .await
            .map_err(|e| RelayError::ChannelClosed(format!("relay mailbox: {e}")))
    }

    /// Get the current relay status.
    ///
    /// Because the mailbox is FIFO, the reply also confirms that everything
    /// sent through this handle earlier has been processed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if the actor has stopped.
    pub async fn get_status(&self) -> Result<RelayStatus, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RelayError::ChannelClosed(format!("relay mailbox: {e}")))?;

        rx.await
            .map_err(|e| RelayError::ChannelClosed(format!("relay reply: {e}")))
    }

    /// Start a graceful shutdown and return once the relay has stopped
    /// accepting connections.
    ///
    /// The actor then closes every connection and handles their disconnects
    /// for up to `deadline`. Await the task from [`Self::spawn`] to wait for
    /// that drain.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ChannelClosed`] if the actor has already stopped.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Shutdown {
                deadline,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::ChannelClosed(format!("relay mailbox: {e}")))?;

        rx.await
            .map_err(|e| RelayError::ChannelClosed(format!("relay reply: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for connection actors and servers.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `RelayActor` implementation.
pub struct RelayActor {
    instance_id: String,
    receiver: mpsc::Receiver<RelayMessage>,
    /// Root cancellation token.
    cancel_token: CancellationToken,
    state: SignalingState,
    accepting_new: bool,
    drain_deadline: Duration,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RelayActor {
    fn new(
        instance_id: String,
        receiver: mpsc::Receiver<RelayMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Relay, &instance_id);

        Self {
            instance_id,
            receiver,
            cancel_token,
            state: SignalingState::new(),
            accepting_new: true,
            drain_deadline: DEFAULT_DRAIN_DEADLINE,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.actor.relay", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "relay.actor.relay",
            instance_id = %self.instance_id,
            "RelayActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor.relay",
                        instance_id = %self.instance_id,
                        "RelayActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.process(message),
                        None => {
                            info!(
                                target: "relay.actor.relay",
                                instance_id = %self.instance_id,
                                "RelayActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "relay.actor.relay",
            instance_id = %self.instance_id,
            connections_remaining = self.state.connection_count(),
            messages_processed = self.mailbox.messages_processed(),
            peak_mailbox_depth = self.mailbox.peak_depth(),
            "RelayActor stopped"
        );
    }

    fn process(&mut self, message: RelayMessage) {
        self.mailbox.record_depth(self.receiver.len());
        self.handle_message(message);
        self.mailbox.record_processed();
        prom::set_connections_active(self.state.connection_count());
        prom::set_rooms_active(self.state.room_count());
    }

    fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::Connect { handle, respond_to } => {
                let result = self.connect(handle);
                let _ = respond_to.send(result);
            }

            RelayMessage::Inbound {
                client_id,
                connection_id,
                message,
                received_at,
            } => {
                self.inbound(&client_id, connection_id, message, received_at);
            }

            RelayMessage::Disconnect {
                client_id,
                connection_id,
            } => {
                self.disconnect(&client_id, connection_id);
            }

            RelayMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RelayMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                info!(
                    target: "relay.actor.relay",
                    instance_id = %self.instance_id,
                    connection_count = self.state.connection_count(),
                    "Initiating graceful shutdown"
                );
                self.accepting_new = false;
                self.drain_deadline = deadline;
                self.cancel_token.cancel();
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    fn connect(&mut self, handle: ConnectionActorHandle) -> Result<(), RelayError> {
        if !self.accepting_new {
            handle.close(CloseReason::ShuttingDown);
            return Err(RelayError::Draining);
        }

        let client_id = handle.client_id().clone();
        let connection_id = handle.connection_id();
        let outcome = self.state.connect(handle);

        info!(
            target: "relay.actor.relay",
            client_id = %client_id,
            connection_id = %connection_id,
            replaced = matches!(outcome, ConnectOutcome::Replaced { .. }),
            total_connections = self.state.connection_count(),
            "Connection registered"
        );

        Ok(())
    }

    fn inbound(
        &mut self,
        client_id: &ClientId,
        connection_id: ConnectionId,
        message: ClientMessage,
        received_at: Instant,
    ) {
        let action = message.action();
        prom::record_message(action);

        let outcome = self.state.handle_inbound(client_id, connection_id, message);
        prom::record_message_latency(action, received_at.elapsed());

        if let InboundOutcome::Joined {
            room_id,
            existing_members,
        } = &outcome
        {
            info!(
                target: "relay.actor.relay",
                client_id = %client_id,
                room_id = %room_id,
                existing_members = existing_members,
                "Client joined room"
            );
        } else {
            debug!(
                target: "relay.actor.relay",
                client_id = %client_id,
                action = action,
                outcome = ?outcome,
                "Inbound message handled"
            );
        }
    }

    fn disconnect(&mut self, client_id: &ClientId, connection_id: ConnectionId) {
        match self.state.disconnect(client_id, connection_id) {
            DisconnectOutcome::Removed(summary) => {
                info!(
                    target: "relay.actor.relay",
                    client_id = %client_id,
                    connection_id = %connection_id,
                    rooms_left = summary.rooms_left.len(),
                    peers_notified = summary.peers_notified,
                    total_connections = self.state.connection_count(),
                    "Connection removed"
                );
            }
            DisconnectOutcome::Stale => {}
        }
    }

    fn get_status(&self) -> RelayStatus {
        RelayStatus {
            instance_id: self.instance_id.clone(),
            connection_count: self.state.connection_count(),
            room_count: self.state.room_count(),
            rooms: self.state.rooms_snapshot(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
            peak_mailbox_depth: self.mailbox.peak_depth(),
            active_writers: self.metrics.connection_count(),
            frames_sent: self.metrics.frames_sent(),
            actor_panics: self.metrics.panic_count(),
        }
    }

    /// Close every connection and process disconnects until drained.
    async fn graceful_shutdown(&mut self) {
        self.accepting_new = false;
        let closing = self.state.close_all(CloseReason::ShuttingDown);

        info!(
            target: "relay.actor.relay",
            instance_id = %self.instance_id,
            closing = closing,
            deadline_ms = u64::try_from(self.drain_deadline.as_millis()).unwrap_or(u64::MAX),
            "Performing graceful shutdown"
        );

        let deadline = tokio::time::Instant::now() + self.drain_deadline;
        while self.state.connection_count() > 0 {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(message)) => self.process(message),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        target: "relay.actor.relay",
                        instance_id = %self.instance_id,
                        remaining = self.state.connection_count(),
                        "Drain deadline reached with connections still open"
                    );
                    break;
                }
            }
        }

        info!(
            target: "relay.actor.relay",
            instance_id = %self.instance_id,
            "Graceful shutdown complete"
        );
    }
}
