//! Test utilities for agentwire-client.
//!
//! [`MockTransport`] replays a script of connection outcomes so the
//! reconnect logic and the reducer wiring can be exercised without a server.
//!
//! Enable with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! agentwire-client = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! use agentwire_client::test_utils::MockTransport;
//! use agentwire_client::{ClientConfig, Session};
//!
//! # async fn example() -> agentwire_client::ClientResult<()> {
//! let transport = MockTransport::new();
//! let server = transport.live_socket();
//!
//! let session = Session::new(ClientConfig::new("ws://localhost/ws"), transport);
//! session.connect("demo").await?;
//! server.send_event("message_chunk", serde_json::json!({"content": "Hi"}));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use agentwire_core::RawEvent;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Frame, Socket, Transport};

enum Scripted {
    Refuse(String),
    Accept {
        frames: VecDeque<Frame>,
        live: Option<mpsc::UnboundedReceiver<Frame>>,
    },
}

#[derive(Default)]
struct Recorded {
    urls: Vec<String>,
    sent: Vec<String>,
    closes: usize,
}

/// A scripted transport.
///
/// Each `connect` consumes the next scripted outcome. Once the script runs
/// out every handshake is refused.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next handshake fails with `reason`.
    pub fn with_refusal(self, reason: impl Into<String>) -> Self {
        self.script.lock().push_back(Scripted::Refuse(reason.into()));
        self
    }

    /// Next handshake succeeds; the socket yields `frames` and then stays open.
    ///
    /// End `frames` with [`Frame::Closed`] to simulate the server hanging up.
    pub fn with_frames(self, frames: Vec<Frame>) -> Self {
        self.script.lock().push_back(Scripted::Accept {
            frames: frames.into(),
            live: None,
        });
        self
    }

    /// Next handshake succeeds with a socket that stays open until closed by the client.
    pub fn with_open_socket(self) -> Self {
        self.with_frames(Vec::new())
    }

    /// Next handshake succeeds with a socket driven by the returned [`MockServer`].
    pub fn live_socket(&self) -> MockServer {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().push_back(Scripted::Accept {
            frames: VecDeque::new(),
            live: Some(rx),
        });
        MockServer { frames: tx }
    }

    /// Number of handshakes attempted.
    pub fn connect_count(&self) -> usize {
        self.recorded.lock().urls.len()
    }

    /// URLs of every handshake attempt, in order.
    pub fn urls(&self) -> Vec<String> {
        self.recorded.lock().urls.clone()
    }

    /// Text frames the client sent, across all sockets.
    pub fn sent(&self) -> Vec<String> {
        self.recorded.lock().sent.clone()
    }

    /// Number of sockets the client closed.
    pub fn close_count(&self) -> usize {
        self.recorded.lock().closes
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Socket>> {
        self.recorded.lock().urls.push(url.to_string());
        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Accept { frames, live }) => Ok(Box::new(MockSocket {
                frames,
                live,
                recorded: Arc::clone(&self.recorded),
            })),
            Some(Scripted::Refuse(reason)) => Err(ClientError::Handshake(reason)),
            None => Err(ClientError::Handshake("no scripted connection".to_string())),
        }
    }
}

struct MockSocket {
    frames: VecDeque<Frame>,
    live: Option<mpsc::UnboundedReceiver<Frame>>,
    recorded: Arc<Mutex<Recorded>>,
}

#[async_trait]
impl Socket for MockSocket {
    async fn next_frame(&mut self) -> Frame {
        if let Some(frame) = self.frames.pop_front() {
            return frame;
        }
        match self.live.as_mut() {
            Some(live) => live.recv().await.unwrap_or(Frame::Closed { clean: false }),
            None => std::future::pending().await,
        }
    }

    async fn send_text(&mut self, text: String) -> ClientResult<()> {
        self.recorded.lock().sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.recorded.lock().closes += 1;
    }
}

/// Server side of a live mock socket. Dropping it closes the socket uncleanly.
#[derive(Clone)]
pub struct MockServer {
    frames: mpsc::UnboundedSender<Frame>,
}

impl MockServer {
    /// Push a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frames.send(Frame::Text(text.into()));
    }

    /// Push an event envelope.
    pub fn send_event(&self, kind: &str, data: Value) {
        let raw = RawEvent::new(kind, data);
        match serde_json::to_string(&raw) {
            Ok(text) => self.send_text(text),
            Err(e) => panic!("event envelope did not serialize: {}", e),
        }
    }

    /// Hang up.
    pub fn close(&self, clean: bool) {
        let _ = self.frames.send(Frame::Closed { clean });
    }
}
