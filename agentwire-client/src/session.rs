//! A streaming session: connection, reducer task and shared state.
//!
//! The reducer task is the only writer to [`SessionState`]. Every input
//! (inbound events, connection status, local user actions) is queued as an
//! [`Action`] and applied in order. Readers take a short read lock through
//! [`Session::state`] and can wait on [`Session::changes`] for new revisions.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use agentwire_core::{reduce, Action, ClientCommand, ClientConfig, SessionState};

use crate::connection::ConnectionManager;
use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;

/// A client session against one backend.
///
/// Must be created inside a Tokio runtime.
pub struct Session<T: Transport> {
    connection: ConnectionManager<T>,
    state: Arc<RwLock<SessionState>>,
    actions: mpsc::Sender<Action>,
    changes: watch::Receiver<u64>,
    reducer: JoinHandle<()>,
}

impl<T: Transport> Session<T> {
    /// Create a disconnected session and start its reducer task.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let (actions_tx, actions_rx) = mpsc::channel(config.channel_capacity);
        let (changes_tx, changes_rx) = watch::channel(0);
        let state = Arc::new(RwLock::new(SessionState::new()));

        let reducer = tokio::spawn(run_reducer(actions_rx, Arc::clone(&state), changes_tx));
        let connection = ConnectionManager::new(config, transport, actions_tx.clone());

        Self {
            connection,
            state,
            actions: actions_tx,
            changes: changes_rx,
            reducer,
        }
    }

    /// Connect to a session id, replacing any current connection.
    pub async fn connect(&self, session_id: &str) -> ClientResult<()> {
        self.connection.connect(session_id).await
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
        info!("session disconnected");
    }

    /// Record a user message locally, then send it.
    ///
    /// Starts a new workflow for the request. If the socket goes away between
    /// recording and sending, a system message notes the failure.
    pub async fn send_message(&self, content: impl Into<String>) -> ClientResult<()> {
        if !self.connection.is_open() {
            return Err(ClientError::NotConnected);
        }
        let content = content.into();
        let command = ClientCommand::message(content.clone());
        self.dispatch(Action::UserMessage { content }).await?;
        if let Err(e) = self.connection.send(&command).await {
            self.dispatch(Action::SendFailed {
                reason: e.to_string(),
            })
            .await?;
            return Err(e);
        }
        Ok(())
    }

    /// Approve a generated plan.
    pub async fn approve_plan(&self, confirmation_id: impl Into<String>) -> ClientResult<()> {
        self.respond_to_plan(confirmation_id.into(), true).await
    }

    /// Reject a generated plan.
    pub async fn reject_plan(&self, confirmation_id: impl Into<String>) -> ClientResult<()> {
        self.respond_to_plan(confirmation_id.into(), false).await
    }

    async fn respond_to_plan(&self, confirmation_id: String, approved: bool) -> ClientResult<()> {
        let command = if approved {
            ClientCommand::approve_plan(confirmation_id.clone())
        } else {
            ClientCommand::reject_plan(confirmation_id.clone())
        };
        self.connection.send(&command).await?;
        self.dispatch(Action::PlanResponse {
            confirmation_id,
            approved,
        })
        .await
    }

    /// Drop every tracked workflow.
    pub async fn clear_workflows(&self) -> ClientResult<()> {
        self.dispatch(Action::ClearWorkflows).await
    }

    /// Queue an action for the reducer.
    pub async fn dispatch(&self, action: Action) -> ClientResult<()> {
        self.actions
            .send(action)
            .await
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Read the current state. Hold the guard briefly: the reducer waits on it.
    pub fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read()
    }

    /// Receiver that sees a new revision number after every applied action.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    /// The connection manager.
    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.reducer.abort();
    }
}

async fn run_reducer(
    mut actions: mpsc::Receiver<Action>,
    state: Arc<RwLock<SessionState>>,
    changes: watch::Sender<u64>,
) {
    let mut revision = 0u64;
    while let Some(action) = actions.recv().await {
        reduce(&mut state.write(), action);
        revision += 1;
        changes.send_replace(revision);
    }
    debug!("reducer stopped after {} action(s)", revision);
}
