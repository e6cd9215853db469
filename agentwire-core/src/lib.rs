//! # Agentwire Core
//!
//! Client-side state for a streaming agent session.
//!
//! The backend pushes JSON events over a websocket: reasoning text, answer
//! text, tool activity, and the plan/step lifecycle of multi-step workflows.
//! This crate turns that stream into a view-model a UI can render directly:
//! finalized [`Message`]s, in-flight [`AssistantMessage`]s made of reasoning
//! and answer [`Block`]s, and [`Workflow`]s with per-step progress.
//!
//! It has no I/O of its own. The `agentwire-client` crate owns the socket
//! and feeds [`Action`]s into [`reduce`] from a single task.
//!
//! ## Reducing events
//!
//! ```
//! use agentwire_core::{reduce, Action, RawEvent, SessionState};
//! use serde_json::json;
//!
//! let mut state = SessionState::new();
//! for (kind, data) in [
//!     ("message_start", json!({"message_id": "m1"})),
//!     ("thinking", json!({"message": "Looking it up"})),
//!     ("message_chunk", json!({"message_id": "m1", "content": "Paris"})),
//!     ("message_complete", json!({"message_id": "m1"})),
//! ] {
//!     reduce(&mut state, Action::Event(RawEvent::new(kind, data)));
//! }
//!
//! let message = &state.messages()[0];
//! assert_eq!(message.content, "Paris");
//! assert_eq!(message.reasoning_blocks()[0].content, "Looking it up");
//! ```
//!
//! ## Ordering
//!
//! Every event is stamped with a per-session receipt sequence number. Block
//! order, and therefore the reasoning/answer pairing from [`pair_blocks`],
//! depends only on that number, never on wall-clock time.

pub mod accumulator;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod message;
pub mod pairing;
pub mod state;
pub mod workflow;

pub use accumulator::{BlockStore, UpdateOutcome};
pub use command::ClientCommand;
pub use config::{ClientConfig, ReconnectConfig};
pub use dispatcher::reduce;
pub use error::{ConfigError, EventError};
pub use event::{RawEvent, StreamEvent};
pub use message::{AssistantMessage, Block, BlockKind, Message, MessageMetadata, Role};
pub use pairing::{pair_blocks, PairedBlock, ReasoningAnswerPair};
pub use state::{Action, ConnectionStatus, Cursors, ReasoningCursor, SessionState};
pub use workflow::{StepStatus, Workflow, WorkflowPlan, WorkflowStatus, WorkflowStep, WorkflowTracker};
