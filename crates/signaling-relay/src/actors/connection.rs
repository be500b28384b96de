//! `ConnectionActor` - per-WebSocket writer actor.
//!
//! Each `ConnectionActor`:
//! - Owns the write half of exactly one WebSocket
//! - Drains a bounded outbound queue of [`ServerFrame`]s into the socket
//! - Sends a close frame when replaced or when the relay shuts down
//!
//! The read half stays with the transport task, which decodes frames and
//! forwards them to the `RelayActor`.
//!
//! # Lifecycle
//!
//! 1. Spawned by the transport once the upgrade completes
//! 2. Runs until told to close, its token is cancelled, or a write fails
//! 3. Cancels its own token on exit so the paired reader stops too

use crate::errors::RelayError;

use super::messages::{CloseReason, ConnectionMessage};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use axum::extract::ws::{CloseFrame, Message};
use common::types::{ClientId, ConnectionId};
use futures::{Sink, SinkExt};
use signaling_protocol::{encode_server_frame, ServerFrame};
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Handle to a `ConnectionActor`.
///
/// This is what the connection registry stores for each client.
#[derive(Clone, Debug)]
pub struct ConnectionActorHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    connection_id: ConnectionId,
    client_id: ClientId,
}

impl ConnectionActorHandle {
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Queue a frame for the client without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the outbound queue is full and
    /// [`RelayError::ChannelClosed`] if the actor has stopped.
    pub fn try_deliver(&self, frame: ServerFrame) -> Result<(), RelayError> {
        self.sender
            .try_send(ConnectionMessage::Deliver { frame })
            .map_err(|e| match e {
                TrySendError::Full(_) => RelayError::Internal("outbound queue full".to_string()),
                TrySendError::Closed(_) => {
                    RelayError::ChannelClosed("connection actor stopped".to_string())
                }
            })
    }

    /// Ask the actor to send a close frame and stop.
    ///
    /// Falls back to cancellation if the queue cannot take the request.
    pub fn close(&self, reason: CloseReason) {
        if self
            .sender
            .try_send(ConnectionMessage::Close { reason })
            .is_err()
        {
            self.cancel_token.cancel();
        }
    }

    /// Cancel the connection actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Handle with no actor behind it; the receiver sees everything queued.
    #[cfg(test)]
    pub(crate) fn detached(
        client_id: &str,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<ConnectionMessage>) {
        let (sender, receiver) = mpsc::channel(buffer);
        let handle = Self {
            sender,
            cancel_token: CancellationToken::new(),
            connection_id: ConnectionId::new(),
            client_id: ClientId::from(client_id),
        };
        (handle, receiver)
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor<S> {
    connection_id: ConnectionId,
    client_id: ClientId,
    receiver: mpsc::Receiver<ConnectionMessage>,
    /// Write half of the WebSocket.
    sink: S,
    /// Child of the relay's root token; shared with the paired reader.
    cancel_token: CancellationToken,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
    is_closing: bool,
}

impl<S> ConnectionActor<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    /// Spawn a new connection actor writing into `sink`.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        client_id: ClientId,
        sink: S,
        outbound_buffer: usize,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (ConnectionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(outbound_buffer);
        let connection_id = ConnectionId::new();

        let actor = Self {
            connection_id,
            client_id: client_id.clone(),
            receiver,
            sink,
            cancel_token: cancel_token.clone(),
            metrics: Arc::clone(&metrics),
            mailbox: MailboxMonitor::new(ActorType::Connection, connection_id.to_string()),
            is_closing: false,
        };

        metrics.connection_created();
        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionActorHandle {
            sender,
            cancel_token,
            connection_id,
            client_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(
        skip_all,
        name = "relay.actor.connection",
        fields(connection_id = %self.connection_id, client_id = %self.client_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "relay.actor.connection",
            connection_id = %self.connection_id,
            client_id = %self.client_id,
            "ConnectionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "relay.actor.connection",
                        connection_id = %self.connection_id,
                        "ConnectionActor received cancellation signal"
                    );
                    self.close_socket(CloseReason::ShuttingDown).await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_depth(self.receiver.len());
                            let should_exit = self.handle_message(message).await;
                            self.mailbox.record_processed();

                            if should_exit {
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "relay.actor.connection",
                                connection_id = %self.connection_id,
                                "ConnectionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        // Stops the paired reader if it is still waiting on the socket.
        self.cancel_token.cancel();
        self.metrics.connection_closed(self.mailbox.peak_depth());

        info!(
            target: "relay.actor.connection",
            connection_id = %self.connection_id,
            client_id = %self.client_id,
            messages_processed = self.mailbox.messages_processed(),
            peak_outbound_depth = self.mailbox.peak_depth(),
            "ConnectionActor stopped"
        );
    }

    /// Handle a single message. Returns true if the actor should exit.
    async fn handle_message(&mut self, message: ConnectionMessage) -> bool {
        match message {
            ConnectionMessage::Deliver { frame } => self.write_frame(&frame).await,
            ConnectionMessage::Close { reason } => {
                self.close_socket(reason).await;
                true
            }
        }
    }

    /// Write one frame. Returns true if the socket is no longer writable.
    async fn write_frame(&mut self, frame: &ServerFrame) -> bool {
        if self.is_closing {
            return true;
        }

        let text = match encode_server_frame(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    target: "relay.actor.connection",
                    connection_id = %self.connection_id,
                    kind = frame.kind(),
                    error = %e,
                    "Failed to encode outbound frame"
                );
                return false;
            }
        };

        if let Err(e) = self.sink.send(Message::Text(text)).await {
            debug!(
                target: "relay.actor.connection",
                connection_id = %self.connection_id,
                error = %e,
                "Socket write failed"
            );
            return true;
        }

        self.metrics.record_frame_sent();
        false
    }

    async fn close_socket(&mut self, reason: CloseReason) {
        if self.is_closing {
            return;
        }
        self.is_closing = true;

        debug!(
            target: "relay.actor.connection",
            connection_id = %self.connection_id,
            reason = reason.as_str(),
            "Closing connection"
        );

        let frame = CloseFrame {
            code: reason.close_code(),
            reason: Cow::Borrowed(reason.as_str()),
        };
        if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
            // Peer already gone.
            debug!(
                target: "relay.actor.connection",
                connection_id = %self.connection_id,
                error = %e,
                "Close frame not sent"
            );
        }
    }
}
