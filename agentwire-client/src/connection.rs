//! Connection lifecycle for one session.
//!
//! [`ConnectionManager`] keeps exactly one logical connection per session.
//! Each connection runs in its own task that owns the socket: it forwards
//! inbound frames to the reducer as [`Action::Event`], writes queued outbound
//! commands, and reconnects after an unexpected close.
//!
//! ```text
//! Connecting --handshake ok--> Open --close--> Closed --delay--> Connecting ...
//!     |                          |
//!  handshake failed           cancelled
//!     v                          v
//!  SetupFailed                Closing --> Closed
//! ```
//!
//! Reconnect delay grows linearly (`base_delay_ms * attempt`). A failed first
//! handshake is reported as [`ConnectionStatus::SetupFailed`] and is never
//! retried.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use agentwire_core::{Action, ClientCommand, ClientConfig, ConnectionStatus, RawEvent, ReconnectConfig};

use crate::error::{ClientError, ClientResult};
use crate::transport::{Frame, Socket, Transport};

/// Phase of the socket owned by a connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPhase {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// The connection currently owned by the manager.
struct ActiveConnection {
    session_id: String,
    cancel: CancellationToken,
    phase: Arc<Mutex<SocketPhase>>,
    outbound: mpsc::Sender<String>,
    task: JoinHandle<()>,
}

impl ActiveConnection {
    fn phase(&self) -> SocketPhase {
        *self.phase.lock()
    }
}

/// Owns the websocket for a session and reports status to the reducer.
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    actions: mpsc::Sender<Action>,
    active: Mutex<Option<ActiveConnection>>,
    /// Serializes connect/disconnect so a replaced socket is gone before the next opens.
    lifecycle: tokio::sync::Mutex<()>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager that reports to the given reducer queue.
    pub fn new(config: ClientConfig, transport: T, actions: mpsc::Sender<Action>) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            actions,
            active: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session the current connection belongs to.
    pub fn session_id(&self) -> Option<String> {
        self.active.lock().as_ref().map(|c| c.session_id.clone())
    }

    /// Phase of the current socket, `Closed` if there is none.
    pub fn phase(&self) -> SocketPhase {
        self.active
            .lock()
            .as_ref()
            .map(ActiveConnection::phase)
            .unwrap_or(SocketPhase::Closed)
    }

    pub fn is_open(&self) -> bool {
        self.phase() == SocketPhase::Open
    }

    /// Connect to a session, replacing any existing connection.
    ///
    /// Resolves once the first handshake has finished. A handshake failure is
    /// returned here and also reported as [`ConnectionStatus::SetupFailed`].
    pub async fn connect(&self, session_id: &str) -> ClientResult<()> {
        let url = self.config.session_url(session_id)?;
        let _lifecycle = self.lifecycle.lock().await;

        self.shutdown_active().await;

        let cancel = CancellationToken::new();
        let phase = Arc::new(Mutex::new(SocketPhase::Connecting));
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.channel_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = ConnectionTask {
            transport: Arc::clone(&self.transport),
            url: url.to_string(),
            reconnect: self.config.reconnect.clone(),
            actions: self.actions.clone(),
            cancel: cancel.clone(),
            phase: Arc::clone(&phase),
            outbound: outbound_rx,
        };
        info!("connecting session {} to {}", session_id, url);
        let handle = tokio::spawn(task.run(ready_tx));

        *self.active.lock() = Some(ActiveConnection {
            session_id: session_id.trim().to_string(),
            cancel,
            phase,
            outbound: outbound_tx,
            task: handle,
        });

        ready_rx.await.unwrap_or(Err(ClientError::ChannelClosed))
    }

    /// Close the connection and cancel any pending reconnect.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.shutdown_active().await;
        if self.actions.send(Action::Reset).await.is_err() {
            debug!("reducer gone before disconnect reset");
        }
    }

    /// Queue a command on the open socket.
    pub async fn send(&self, command: &ClientCommand) -> ClientResult<()> {
        let text = command.to_json()?;
        let outbound = {
            let active = self.active.lock();
            match active.as_ref() {
                Some(conn) if conn.phase() == SocketPhase::Open => conn.outbound.clone(),
                _ => return Err(ClientError::NotConnected),
            }
        };
        outbound
            .send(text)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Stop the current connection task and wait for its socket to close.
    async fn shutdown_active(&self) {
        let Some(previous) = self.active.lock().take() else {
            return;
        };

        if previous.phase() == SocketPhase::Closing {
            debug!("deferring until session {} finishes closing", previous.session_id);
        }
        // A cancelled task reports no further status, so its close cannot trigger a reconnect
        previous.cancel.cancel();
        if let Err(e) = previous.task.await {
            warn!("connection task for {} ended abnormally: {}", previous.session_id, e);
        }
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.cancel.cancel();
        }
    }
}

enum PumpExit {
    Cancelled,
    Closed { clean: bool },
}

/// State owned by one connection task.
struct ConnectionTask<T: Transport> {
    transport: Arc<T>,
    url: String,
    reconnect: ReconnectConfig,
    actions: mpsc::Sender<Action>,
    cancel: CancellationToken,
    phase: Arc<Mutex<SocketPhase>>,
    outbound: mpsc::Receiver<String>,
}

impl<T: Transport> ConnectionTask<T> {
    async fn run(mut self, ready: oneshot::Sender<ClientResult<()>>) {
        self.report(ConnectionStatus::Connecting).await;

        let first = tokio::select! {
            _ = self.cancel.cancelled() => {
                let _ = ready.send(Err(ClientError::ChannelClosed));
                return;
            }
            result = self.transport.connect(&self.url) => result,
        };
        let mut socket = match first {
            Ok(socket) => socket,
            Err(e) => {
                warn!("initial connection to {} failed: {}", self.url, e);
                self.set_phase(SocketPhase::Closed);
                self.report(ConnectionStatus::SetupFailed {
                    reason: e.to_string(),
                })
                .await;
                let _ = ready.send(Err(e));
                return;
            }
        };

        let mut ready = Some(ready);
        loop {
            self.set_phase(SocketPhase::Open);
            self.report(ConnectionStatus::Connected).await;
            if let Some(ready) = ready.take() {
                let _ = ready.send(Ok(()));
            }
            info!("connected to {}", self.url);

            match self.pump(socket.as_mut()).await {
                PumpExit::Cancelled => {
                    self.set_phase(SocketPhase::Closing);
                    socket.close().await;
                    self.set_phase(SocketPhase::Closed);
                    debug!("connection to {} closed on request", self.url);
                    return;
                }
                PumpExit::Closed { clean } => {
                    self.set_phase(SocketPhase::Closed);
                    if clean {
                        info!("server closed connection to {}", self.url);
                    } else {
                        warn!("connection to {} dropped", self.url);
                    }
                }
            }

            socket = match self.reconnect().await {
                Some(socket) => socket,
                None => return,
            };
        }
    }

    /// Retry with linear backoff. `None` once cancelled or out of attempts.
    async fn reconnect(&mut self) -> Option<Box<dyn Socket>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if !self.reconnect.allows(attempt) {
                let attempts = attempt - 1;
                warn!("giving up on {} after {} reconnect attempt(s)", self.url, attempts);
                self.report(ConnectionStatus::Exhausted { attempts }).await;
                return None;
            }

            let delay = self.reconnect.delay_for(attempt);
            self.report(ConnectionStatus::Reconnecting {
                attempt,
                delay_ms: delay.as_millis() as u64,
            })
            .await;
            debug!("reconnecting to {} in {:?} (attempt {})", self.url, delay, attempt);

            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            self.set_phase(SocketPhase::Connecting);
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                result = self.transport.connect(&self.url) => result,
            };
            match result {
                Ok(socket) => return Some(socket),
                Err(e) => {
                    warn!("reconnect attempt {} to {} failed: {}", attempt, self.url, e);
                    self.set_phase(SocketPhase::Closed);
                }
            }
        }
    }

    /// Move frames until the socket closes or the task is cancelled.
    async fn pump(&mut self, socket: &mut dyn Socket) -> PumpExit {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                frame = socket.next_frame() => match frame {
                    Frame::Text(text) => match RawEvent::parse(&text) {
                        Ok(raw) => {
                            if self.actions.send(Action::Event(raw)).await.is_err() {
                                debug!("reducer gone, closing {}", self.url);
                                return PumpExit::Cancelled;
                            }
                        }
                        Err(e) => warn!("dropping malformed frame: {}", e),
                    },
                    Frame::Closed { clean } => return PumpExit::Closed { clean },
                },
                Some(text) = self.outbound.recv() => {
                    if let Err(e) = socket.send_text(text).await {
                        warn!("failed to send command to {}: {}", self.url, e);
                    }
                }
            }
        }
    }

    fn set_phase(&self, phase: SocketPhase) {
        *self.phase.lock() = phase;
    }

    /// Report a status change unless this connection has been replaced.
    async fn report(&self, status: ConnectionStatus) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.actions.send(Action::Connection(status)).await.is_err() {
            debug!("reducer gone, status change dropped");
        }
    }
}
