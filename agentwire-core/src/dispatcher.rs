//! The reducer: folds [`Action`]s into [`SessionState`].
//!
//! Conversation events are routed through three cursors (message, reasoning
//! block, answer block). A `thinking` event after an answer opens a new
//! reasoning cycle, so one assistant message can hold several
//! reasoning/answer pairs. Every event receives a receipt sequence number
//! before it is applied; block order is decided by that number alone.

use log::{debug, warn};
use serde_json::Value;

use crate::event::{RawEvent, StreamEvent};
use crate::message::{BlockKind, Message, Role};
use crate::state::{Action, ConnectionStatus, Cursors, ReasoningCursor, SessionState};

const REASONING: BlockKind = BlockKind::Reasoning;
const ANSWER: BlockKind = BlockKind::Answer;

/// Apply one action to the session state.
pub fn reduce(state: &mut SessionState, action: Action) {
    match action {
        Action::Event(raw) => apply_raw(state, &raw),
        Action::Connection(status) => {
            debug!("connection status {:?}", status);
            if matches!(
                status,
                ConnectionStatus::Disconnected
                    | ConnectionStatus::SetupFailed { .. }
                    | ConnectionStatus::Exhausted { .. }
            ) {
                reset_stream(state);
            }
            state.connection = status;
        }
        Action::UserMessage { content } => {
            state.messages.push(Message::user(content));
            let id = uuid::Uuid::new_v4().to_string();
            state.workflows.begin(id);
        }
        Action::SendFailed { reason } => {
            warn!("user message not sent: {}", reason);
            state
                .messages
                .push(Message::system(format!("Error: message not sent: {}", reason)));
        }
        Action::PlanResponse {
            confirmation_id,
            approved,
        } => {
            if !state.workflows.respond_to_plan(&confirmation_id, approved) {
                warn!("no workflow for plan confirmation {}", confirmation_id);
            }
        }
        Action::ClearWorkflows => state.workflows.clear_all(),
        Action::Reset => {
            reset_stream(state);
            state.connection = ConnectionStatus::Disconnected;
        }
    }
}

/// Validate and apply one inbound envelope. Malformed events are dropped.
pub fn apply_raw(state: &mut SessionState, raw: &RawEvent) {
    match StreamEvent::from_raw(raw) {
        Ok(event) => apply_event(state, event),
        Err(e) => {
            warn!("dropping {} event: {}", raw.event_type, e);
            state.dropped_events += 1;
        }
    }
}

/// Apply one validated event.
pub fn apply_event(state: &mut SessionState, event: StreamEvent) {
    let seq = state.next_seq();

    if state.workflows.apply(&event) {
        return;
    }

    match event {
        StreamEvent::Message { role, content } => {
            if !content.trim().is_empty() {
                state.messages.push(Message::new(role, content));
            }
        }
        StreamEvent::MessageStart { message_id } => {
            debug!("message {} started", message_id);
            state.cursors = Cursors {
                message_id: Some(message_id),
                ..Cursors::default()
            };
        }
        StreamEvent::Thinking { content } => on_thinking(state, content, seq),
        StreamEvent::MessageChunk {
            content,
            message_id,
        } => on_message_chunk(state, &content, message_id, seq),
        StreamEvent::ToolCall { name, arguments } => {
            on_tool_line(state, format_tool_call(&name, &arguments), seq)
        }
        StreamEvent::ToolResult { result } => {
            on_tool_line(state, format!("[result] {}", result.trim()), seq)
        }
        StreamEvent::MessageComplete {
            message_id,
            content,
        } => on_message_complete(state, message_id, content),
        StreamEvent::Error { message } => {
            state.messages.push(Message::system(format!("Error: {}", message)));
        }
        // Handled by the workflow tracker above
        _ => {}
    }
}

/// Current message id, creating one if no `message_start` arrived.
fn message_cursor(state: &mut SessionState) -> String {
    state
        .cursors
        .message_id
        .get_or_insert_with(|| {
            let id = uuid::Uuid::new_v4().to_string();
            debug!("no message_start seen, using generated message id {}", id);
            id
        })
        .clone()
}

fn new_block_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Take the reasoning cursor if its block is still streaming.
fn take_open_reasoning(state: &mut SessionState, message_id: &str) -> Option<ReasoningCursor> {
    let cursor = state.cursors.reasoning.take()?;
    let streaming = state
        .blocks
        .block(REASONING, message_id, &cursor.block_id)
        .is_some_and(|b| b.is_streaming);
    streaming.then_some(cursor)
}

/// Close the answer block the cursor points at, if any.
fn close_answer(state: &mut SessionState, message_id: &str) {
    if let Some(answer_id) = state.cursors.answer_block_id.take() {
        state.blocks.complete(ANSWER, message_id, &answer_id);
    }
}

/// Write a reasoning cursor's text to its block and keep it as the cursor.
fn write_reasoning(state: &mut SessionState, message_id: &str, cursor: ReasoningCursor, seq: u64) {
    state.blocks.start(REASONING, message_id, &cursor.block_id, seq);
    state
        .blocks
        .update(REASONING, message_id, &cursor.block_id, &cursor.content(), seq);
    state.cursors.reasoning = Some(cursor);
}

fn on_thinking(state: &mut SessionState, content: String, seq: u64) {
    if content.is_empty() {
        return;
    }
    let message_id = message_cursor(state);

    // An answer was streaming: this is a new reasoning cycle
    if state.cursors.answer_block_id.is_some() {
        close_answer(state, &message_id);
        if let Some(previous) = state.cursors.reasoning.take() {
            state.blocks.complete(REASONING, &message_id, &previous.block_id);
        }
    }

    let mut cursor = take_open_reasoning(state, &message_id)
        .unwrap_or_else(|| ReasoningCursor::new(new_block_id()));
    cursor.thinking = content;
    write_reasoning(state, &message_id, cursor, seq);
}

/// Tool activity only ever lands in reasoning; an open answer keeps streaming.
fn on_tool_line(state: &mut SessionState, line: String, seq: u64) {
    let message_id = message_cursor(state);

    let mut cursor = take_open_reasoning(state, &message_id)
        .unwrap_or_else(|| ReasoningCursor::new(new_block_id()));
    cursor.tool_lines.push(line);
    write_reasoning(state, &message_id, cursor, seq);
}

fn on_message_chunk(
    state: &mut SessionState,
    content: &str,
    explicit_id: Option<String>,
    seq: u64,
) {
    if content.is_empty() {
        return;
    }

    let message_id = match explicit_id {
        Some(id) => {
            if let Some(previous) = state.cursors.message_id.replace(id.clone()) {
                if previous != id {
                    state.blocks.migrate(&previous, &id);
                }
            }
            id
        }
        None => message_cursor(state),
    };

    if let Some(reasoning) = state.cursors.reasoning.take() {
        state.blocks.complete(REASONING, &message_id, &reasoning.block_id);
    }

    let open_answer = state.cursors.answer_block_id.clone().filter(|id| {
        state
            .blocks
            .block(ANSWER, &message_id, id)
            .is_some_and(|b| b.is_streaming)
    });
    let answer_id = open_answer.unwrap_or_else(|| {
        let id = new_block_id();
        state.blocks.start(ANSWER, &message_id, &id, seq);
        id
    });
    state.blocks.update(ANSWER, &message_id, &answer_id, content, seq);
    state.cursors.answer_block_id = Some(answer_id);
}

fn on_message_complete(
    state: &mut SessionState,
    explicit_id: Option<String>,
    fallback: Option<String>,
) {
    let message_id = match (explicit_id, state.cursors.message_id.clone()) {
        (Some(explicit), Some(cursor)) => {
            // The real id may only be revealed on completion
            if explicit != cursor
                && state.blocks.get(&explicit).is_none()
                && state.blocks.get(&cursor).is_some()
            {
                state.blocks.migrate(&cursor, &explicit);
                state.cursors.message_id = Some(explicit.clone());
            }
            Some(explicit)
        }
        (explicit, cursor) => explicit.or(cursor),
    };

    state.cursors.reasoning = None;
    state.cursors.answer_block_id = None;

    let fallback = fallback.filter(|c| !c.trim().is_empty());
    let in_flight = message_id.as_deref().and_then(|id| state.blocks.take(id));

    let message = match in_flight {
        Some(in_flight) => {
            let message = Message::from_assistant(in_flight, fallback);
            let has_reasoning = message
                .reasoning_blocks()
                .iter()
                .any(|b| !b.content.is_empty());
            if message.content.is_empty() && !has_reasoning {
                debug!("discarding empty message {:?}", message_id);
                return;
            }
            message
        }
        None => {
            let Some(content) = fallback else {
                return;
            };
            if is_duplicate_completion(state, message_id.as_deref()) {
                debug!("ignoring repeated completion of {:?}", message_id);
                return;
            }
            Message::new(Role::Assistant, content.trim())
        }
    };

    debug!("finalized message {:?}", message_id);
    state.messages.push(message);
}

/// True if the last finalized message came from this same in-flight message.
fn is_duplicate_completion(state: &SessionState, message_id: Option<&str>) -> bool {
    let Some(message_id) = message_id else {
        return false;
    };
    state
        .messages
        .last()
        .and_then(|m| m.metadata.as_ref())
        .is_some_and(|meta| meta.message_id == message_id)
}

/// Close every streaming block and forget the cursors.
fn reset_stream(state: &mut SessionState) {
    let ids: Vec<String> = state.blocks.messages().iter().map(|m| m.id.clone()).collect();
    for id in &ids {
        state.blocks.complete_open(REASONING, id);
        state.blocks.complete_open(ANSWER, id);
    }
    state.cursors = Cursors::default();
}

fn format_tool_call(name: &str, arguments: &Value) -> String {
    let empty = match arguments {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        format!("[tool] {}()", name)
    } else {
        format!("[tool] {}({})", name, arguments)
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
