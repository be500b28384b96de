//! WebSocket test client.

use crate::RECV_TIMEOUT;

use futures::{SinkExt, StreamExt};
use signaling_protocol::{decode_server_frame, encode_client_message, ClientMessage, ServerFrame};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Signaling URL for `user_id` on a relay listening at `addr`.
#[must_use]
pub fn ws_url(addr: SocketAddr, path: &str, user_id: &str) -> String {
    format!("ws://{addr}{path}?userId={user_id}")
}

/// A browser stand-in connected to the relay.
pub struct TestPeer {
    user_id: String,
    stream: WsStream,
}

impl TestPeer {
    /// Connect as `user_id`.
    ///
    /// # Panics
    ///
    /// Panics if the handshake fails.
    pub async fn connect(addr: SocketAddr, path: &str, user_id: &str) -> Self {
        let url = ws_url(addr, path, user_id);
        let (stream, _response) = connect_async(&url)
            .await
            .unwrap_or_else(|e| panic!("connect {url} failed: {e}"));
        Self {
            user_id: user_id.to_string(),
            stream,
        }
    }

    /// Attempt a handshake against an arbitrary URL, returning the error.
    ///
    /// # Errors
    ///
    /// Returns the tungstenite error if the handshake is refused.
    pub async fn try_connect(url: &str) -> Result<(), tungstenite::Error> {
        connect_async(url).await.map(|_| ())
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Encode and send a client message.
    pub async fn send(&mut self, message: &ClientMessage) {
        let text = encode_client_message(message).expect("encode client message");
        self.send_text(text).await;
    }

    /// Send a raw text frame.
    pub async fn send_text(&mut self, text: impl Into<String>) {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .expect("send text frame");
    }

    /// Send a raw binary frame.
    pub async fn send_binary(&mut self, data: Vec<u8>) {
        self.stream
            .send(Message::Binary(data))
            .await
            .expect("send binary frame");
    }

    /// Next non-control message from the relay.
    async fn next_message(&mut self, window: Duration) -> Option<Message> {
        loop {
            let message = tokio::time::timeout(window, self.stream.next()).await.ok()??;
            match message {
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(message) => return Some(message),
                Err(_) => return None,
            }
        }
    }

    /// Next text frame, decoded.
    ///
    /// # Panics
    ///
    /// Panics on timeout, close, or an undecodable frame.
    pub async fn recv(&mut self) -> ServerFrame {
        match self.next_message(RECV_TIMEOUT).await {
            Some(Message::Text(text)) => decode_server_frame(&text)
                .unwrap_or_else(|e| panic!("{}: undecodable frame {text:?}: {e}", self.user_id)),
            other => panic!("{}: expected text frame, got {other:?}", self.user_id),
        }
    }

    /// Next `n` frames, in arrival order.
    pub async fn recv_n(&mut self, n: usize) -> Vec<ServerFrame> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.recv().await);
        }
        frames
    }

    /// Assert that no frame arrives within `window`.
    ///
    /// # Panics
    ///
    /// Panics if a data or close frame arrives.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Some(message) = self.next_message(window).await {
            panic!("{}: expected silence, got {message:?}", self.user_id);
        }
    }

    /// Wait for the relay to close the socket and return the close code.
    ///
    /// # Panics
    ///
    /// Panics on timeout or if a data frame arrives first.
    pub async fn expect_close(&mut self) -> u16 {
        match self.next_message(RECV_TIMEOUT).await {
            Some(Message::Close(Some(frame))) => u16::from(frame.code),
            other => panic!("{}: expected close frame, got {other:?}", self.user_id),
        }
    }

    /// Close the socket from the client side.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
