//! Socket abstraction and the tokio-tungstenite implementation.
//!
//! The connection manager only ever sees [`Transport`] and [`Socket`], which
//! keeps the reconnect logic testable against a scripted transport.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ClientError, ClientResult};

/// A frame surfaced to the connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame (one JSON event envelope).
    Text(String),
    /// The socket is gone. `clean` is true for a normal close handshake.
    Closed { clean: bool },
}

/// An open socket.
#[async_trait]
pub trait Socket: Send {
    /// Wait for the next text frame or the close. Must be cancel safe.
    async fn next_frame(&mut self) -> Frame;

    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> ClientResult<()>;

    /// Start the close handshake and wait for it to finish.
    async fn close(&mut self);
}

/// Opens sockets.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform the handshake. Errors are reported as [`ClientError::Handshake`].
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Socket>>;
}

/// Websocket transport over TCP, with TLS for `wss://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Socket>> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Handshake(e.to_string()))?;
        debug!("websocket handshake with {} returned {}", url, response.status());
        Ok(Box::new(WebSocketSocket { stream }))
    }
}

struct WebSocketSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for WebSocketSocket {
    async fn next_frame(&mut self) -> Frame {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Frame::Text(text),
                Some(Ok(Message::Close(frame))) => {
                    let clean = frame
                        .as_ref()
                        .is_some_and(|f| f.code == CloseCode::Normal);
                    debug!("websocket closed by peer: {:?}", frame);
                    return Frame::Closed { clean };
                }
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("websocket error: {}", e);
                    return Frame::Closed { clean: false };
                }
                None => return Frame::Closed { clean: false },
            }
        }
    }

    async fn send_text(&mut self, text: String) -> ClientResult<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("websocket close: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handshake_failure_is_reported() {
        // A plain TCP server that hangs up before the upgrade
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let url = format!("ws://{}/ws", addr);
        let result = WebSocketTransport::new().connect(&url).await;
        match result {
            Err(e) => assert!(e.is_handshake(), "unexpected error: {}", e),
            Ok(_) => panic!("expected handshake failure"),
        }
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_handshake_error() {
        let result = WebSocketTransport::new().connect("not a url").await;
        assert!(matches!(result, Err(ClientError::Handshake(_))));
    }
}
