//! In-memory socket sink.
//!
//! `ConnectionActor` writes into any `Sink<Message>`. Giving it the sender
//! half of an unbounded channel lets tests read back exactly what would have
//! gone over the wire.

use crate::{RECV_TIMEOUT, SILENCE};

use axum::extract::ws::Message;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use signaling_protocol::{decode_server_frame, ServerFrame};
use std::time::Duration;

/// Create a sink for a connection actor and the capture that reads it.
#[must_use]
pub fn captured_socket() -> (UnboundedSender<Message>, CapturedSocket) {
    let (sink, frames) = unbounded();
    (sink, CapturedSocket { frames })
}

/// Read side of a captured socket.
#[derive(Debug)]
pub struct CapturedSocket {
    frames: UnboundedReceiver<Message>,
}

impl CapturedSocket {
    /// Next raw message written by the actor.
    ///
    /// # Panics
    ///
    /// Panics on timeout or if the actor dropped the sink.
    pub async fn next_message(&mut self) -> Message {
        tokio::time::timeout(RECV_TIMEOUT, self.frames.next())
            .await
            .expect("timed out waiting for a socket write")
            .expect("socket sink dropped")
    }

    /// Next text frame, decoded.
    ///
    /// # Panics
    ///
    /// Panics if the next write is not a decodable text frame.
    pub async fn next_frame(&mut self) -> ServerFrame {
        match self.next_message().await {
            Message::Text(text) => decode_server_frame(&text)
                .unwrap_or_else(|e| panic!("undecodable frame {text:?}: {e}")),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Next `n` frames, in write order.
    pub async fn next_frames(&mut self, n: usize) -> Vec<ServerFrame> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.next_frame().await);
        }
        frames
    }

    /// Close code of the next write.
    ///
    /// # Panics
    ///
    /// Panics if the next write is not a close frame carrying a code.
    pub async fn next_close(&mut self) -> u16 {
        match self.next_message().await {
            Message::Close(Some(frame)) => frame.code,
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    /// Discard everything written so far, waiting [`SILENCE`] for stragglers.
    pub async fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(Some(_)) = tokio::time::timeout(SILENCE, self.frames.next()).await {
            drained += 1;
        }
        drained
    }

    /// Assert that no frame is written within `window`.
    ///
    /// # Panics
    ///
    /// Panics if a message arrives.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(message)) = tokio::time::timeout(window, self.frames.next()).await {
            panic!("expected silence, got {message:?}");
        }
    }
}
