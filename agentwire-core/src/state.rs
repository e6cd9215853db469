//! Session view-model state.
//!
//! [`SessionState`] is the single store every consumer reads. It is only ever
//! mutated through [`crate::reduce`], one [`Action`] at a time.

use crate::accumulator::BlockStore;
use crate::event::RawEvent;
use crate::message::{AssistantMessage, Message};
use crate::workflow::{Workflow, WorkflowTracker};

/// Connection state as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No connection, and none being attempted.
    #[default]
    Disconnected,
    /// Opening the first socket for a session.
    Connecting,
    /// Socket open and receiving events.
    Connected,
    /// Socket dropped; waiting before the given reconnect attempt.
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Delay before the attempt, in milliseconds
        delay_ms: u64,
    },
    /// The initial handshake failed. No reconnect is attempted.
    SetupFailed {
        /// Handshake error message
        reason: String,
    },
    /// Every reconnect attempt failed. Stays here until the next explicit connect.
    Exhausted {
        /// Number of reconnect attempts made
        attempts: u32,
    },
}

impl ConnectionStatus {
    /// True only while a socket is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True for the states that need a new explicit connect to leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SetupFailed { .. } | Self::Exhausted { .. })
    }
}

/// Inputs to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// An inbound frame from the backend.
    Event(RawEvent),
    /// Connection lifecycle change.
    Connection(ConnectionStatus),
    /// The local user sent a message. Starts a new workflow.
    UserMessage { content: String },
    /// A recorded user message could not be sent.
    SendFailed { reason: String },
    /// The local user answered a plan confirmation.
    PlanResponse {
        confirmation_id: String,
        approved: bool,
    },
    /// Drop every workflow.
    ClearWorkflows,
    /// The session was closed: reset cursors and stop all streaming blocks.
    Reset,
}

/// The reasoning block events are currently routed to.
///
/// A reasoning block's text is the latest full `thinking` payload followed by
/// the tool activity logged since the block opened. Keeping the two apart lets
/// a replace-style `thinking` update coexist with appended tool lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningCursor {
    pub block_id: String,
    pub(crate) thinking: String,
    pub(crate) tool_lines: Vec<String>,
}

impl ReasoningCursor {
    pub(crate) fn new(block_id: String) -> Self {
        Self {
            block_id,
            ..Self::default()
        }
    }

    pub(crate) fn content(&self) -> String {
        let tools = self.tool_lines.join("\n");
        match (self.thinking.is_empty(), tools.is_empty()) {
            (_, true) => self.thinking.clone(),
            (true, false) => tools,
            (false, false) => format!("{}\n\n{}", self.thinking.trim_end(), tools),
        }
    }
}

/// The dispatcher's routing references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursors {
    /// Message that content events are routed to. Survives `message_complete`.
    pub message_id: Option<String>,
    pub reasoning: Option<ReasoningCursor>,
    pub answer_block_id: Option<String>,
}

/// Complete client-side view of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) messages: Vec<Message>,
    pub(crate) blocks: BlockStore,
    pub(crate) workflows: WorkflowTracker,
    pub(crate) connection: ConnectionStatus,
    pub(crate) cursors: Cursors,
    pub(crate) next_seq: u64,
    pub(crate) dropped_events: u64,
}

impl SessionState {
    /// Create an empty, disconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalized messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Assistant messages still receiving events.
    pub fn in_flight(&self) -> &[AssistantMessage] {
        self.blocks.messages()
    }

    /// Look up an in-flight assistant message.
    pub fn assistant_message(&self, message_id: &str) -> Option<&AssistantMessage> {
        self.blocks.get(message_id)
    }

    /// Raw block storage.
    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    /// Workflow registry.
    pub fn workflows(&self) -> &WorkflowTracker {
        &self.workflows
    }

    /// The workflow currently displayed.
    pub fn active_workflow(&self) -> Option<&Workflow> {
        self.workflows.active()
    }

    pub fn connection_status(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn cursors(&self) -> &Cursors {
        &self.cursors
    }

    /// Number of inbound events dropped as malformed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Hand out the next receipt sequence number.
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}
