//! # Agentwire Client
//!
//! Websocket runtime for [`agentwire_core`]: owns the socket for a session,
//! reconnects with linear backoff, and runs the single reducer task that
//! folds inbound events into a [`SessionState`].
//!
//! ```ignore
//! use agentwire_client::{ClientConfig, Session, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> agentwire_client::ClientResult<()> {
//!     let session = Session::new(
//!         ClientConfig::new("ws://localhost:8000/ws"),
//!         WebSocketTransport::new(),
//!     );
//!     session.connect("session-1").await?;
//!     session.send_message("Summarize the release notes").await?;
//!
//!     let mut changes = session.changes();
//!     while changes.changed().await.is_ok() {
//!         let state = session.state();
//!         if let Some(last) = state.messages().last() {
//!             println!("{:?}: {}", last.role, last.content);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use connection::{ConnectionManager, SocketPhase};
pub use error::{ClientError, ClientResult};
pub use session::Session;
pub use transport::{Frame, Socket, Transport, WebSocketTransport};

pub use agentwire_core::{
    Action, ClientConfig, ConnectionStatus, Message, ReconnectConfig, Role, SessionState,
};
