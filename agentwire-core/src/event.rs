//! Inbound wire events.
//!
//! Every frame the backend sends is a JSON envelope:
//!
//! ```json
//! { "type": "message_chunk", "timestamp": 1718000000.123, "data": { "content": "Hel" } }
//! ```
//!
//! [`RawEvent`] is the envelope as received. [`StreamEvent::from_raw`] validates
//! the `data` payload for the envelope's `type` and resolves the field aliases
//! different backend versions use (`tool_name`/`name`, `arguments`/`args`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;
use crate::message::Role;

/// Inbound event envelope, exactly as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Sender-side timestamp. Informational only; ordering uses receipt sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

impl RawEvent {
    /// Build an envelope without a timestamp.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: None,
            data,
        }
    }

    /// Attach a sender timestamp.
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    // ===== Conversation =====
    /// A complete, non-streamed message.
    Message { role: Role, content: String },

    /// A new assistant message begins.
    MessageStart { message_id: String },

    /// Reasoning text. Each payload is the full current text of the block.
    Thinking { content: String },

    /// Answer text. Each payload is the full current text of the block.
    MessageChunk {
        content: String,
        /// Backend may reveal the real message id only once generation starts.
        message_id: Option<String>,
    },

    /// The agent invoked a tool.
    ToolCall { name: String, arguments: Value },

    /// A tool returned.
    ToolResult { result: String },

    /// The assistant message is finished.
    MessageComplete {
        message_id: Option<String>,
        content: Option<String>,
    },

    /// Upstream failure to surface to the user.
    Error { message: String },

    // ===== Workflow =====
    /// Incremental planner reasoning (appended).
    PlanThinkingChunk { content: String },

    /// The planner produced a plan.
    PlanGenerated {
        plan: String,
        steps: Vec<String>,
        confirmation_id: Option<String>,
    },

    /// The plan needs user approval before execution continues.
    AwaitingConfirmation,

    /// A workflow step begins.
    StepStart { step: u32, title: String },

    /// Step reasoning delta (appended).
    ThinkingChunk { content: String },

    /// Step output delta (appended).
    ResponseChunk { content: String },

    /// A workflow step finished.
    StepComplete { step: u32 },

    /// Execution paused (typically waiting on the user).
    WorkflowPaused,

    /// The whole workflow finished.
    WorkflowComplete { result: Option<String> },
}

impl StreamEvent {
    /// Validate an envelope's payload for its type.
    pub fn from_raw(raw: &RawEvent) -> Result<Self, EventError> {
        let kind = raw.event_type.as_str();
        let data = &raw.data;

        let event = match kind {
            "message" => {
                let role = text(data, "role")
                    .and_then(|r| Role::parse(&r))
                    .ok_or_else(|| EventError::missing(kind, "role"))?;
                Self::Message {
                    role,
                    content: require_text(data, kind, "content")?,
                }
            }
            "message_start" => Self::MessageStart {
                message_id: require_text(data, kind, "message_id")?,
            },
            "thinking" => Self::Thinking {
                content: first_text(data, &["message", "step"])
                    .ok_or_else(|| EventError::missing(kind, "message"))?,
            },
            "message_chunk" => Self::MessageChunk {
                content: require_text(data, kind, "content")?,
                message_id: text(data, "message_id").filter(|id| !id.is_empty()),
            },
            "tool_call" => Self::ToolCall {
                name: first_text(data, &["tool_name", "name"])
                    .ok_or_else(|| EventError::missing(kind, "tool_name"))?,
                arguments: data
                    .get("arguments")
                    .or_else(|| data.get("args"))
                    .cloned()
                    .unwrap_or(Value::Null),
            },
            "tool_result" => Self::ToolResult {
                result: first_text(data, &["result", "content"])
                    .ok_or_else(|| EventError::missing(kind, "result"))?,
            },
            "message_complete" => Self::MessageComplete {
                message_id: text(data, "message_id").filter(|id| !id.is_empty()),
                content: text(data, "content"),
            },
            "error" => Self::Error {
                message: require_text(data, kind, "message")?,
            },
            "plan_thinking_chunk" => Self::PlanThinkingChunk {
                content: require_text(data, kind, "content")?,
            },
            "plan_generated" => Self::PlanGenerated {
                plan: require_text(data, kind, "plan")?,
                steps: step_titles(data).ok_or_else(|| EventError::missing(kind, "steps"))?,
                confirmation_id: text(data, "confirmation_id"),
            },
            "awaiting_confirmation" => Self::AwaitingConfirmation,
            "step_start" => Self::StepStart {
                step: step_number(data).ok_or_else(|| EventError::missing(kind, "step"))?,
                title: text(data, "title").unwrap_or_default(),
            },
            "thinking_chunk" => Self::ThinkingChunk {
                content: require_text(data, kind, "content")?,
            },
            "response_chunk" => Self::ResponseChunk {
                content: require_text(data, kind, "content")?,
            },
            "step_complete" => Self::StepComplete {
                step: step_number(data).ok_or_else(|| EventError::missing(kind, "step"))?,
            },
            "workflow_paused" => Self::WorkflowPaused,
            "workflow_complete" => Self::WorkflowComplete {
                result: first_text(data, &["result", "final_result"]),
            },
            other => return Err(EventError::UnknownType(other.to_string())),
        };

        Ok(event)
    }

    /// True for events handled by the workflow tracker rather than the block accumulator.
    pub fn is_workflow(&self) -> bool {
        matches!(
            self,
            Self::PlanThinkingChunk { .. }
                | Self::PlanGenerated { .. }
                | Self::AwaitingConfirmation
                | Self::StepStart { .. }
                | Self::ThinkingChunk { .. }
                | Self::ResponseChunk { .. }
                | Self::StepComplete { .. }
                | Self::WorkflowPaused
                | Self::WorkflowComplete { .. }
        )
    }
}

/// Read a field as text. Non-string scalars and objects are rendered as JSON.
fn text(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn first_text(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(data, key))
}

fn require_text(data: &Value, kind: &str, field: &'static str) -> Result<String, EventError> {
    text(data, field).ok_or_else(|| EventError::missing(kind, field))
}

fn step_number(data: &Value) -> Option<u32> {
    match data.get("step")? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Plan steps arrive either as plain titles or as objects.
fn step_titles(data: &Value) -> Option<Vec<String>> {
    let steps = data.get("steps")?.as_array()?;
    Some(
        steps
            .iter()
            .map(|step| match step {
                Value::String(s) => s.clone(),
                Value::Object(_) => first_text(step, &["title", "description", "name"])
                    .unwrap_or_else(|| step.to_string()),
                other => other.to_string(),
            })
            .collect(),
    )
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
