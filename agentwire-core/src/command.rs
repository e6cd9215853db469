//! Outbound client commands.

use serde::{Deserialize, Serialize};

/// Commands the client sends to the backend.
///
/// Serialized with a snake_case `type` tag:
///
/// ```
/// use agentwire_core::ClientCommand;
///
/// let cmd = ClientCommand::approve_plan("c-42");
/// assert_eq!(
///     cmd.to_json().unwrap(),
///     r#"{"type":"approve_plan","confirmation_id":"c-42"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// A user message that starts an agent run.
    Message {
        /// Message text.
        content: String,
    },

    /// Approve a generated plan.
    ApprovePlan {
        /// Confirmation id from `plan_generated`.
        confirmation_id: String,
    },

    /// Reject a generated plan.
    RejectPlan {
        /// Confirmation id from `plan_generated`.
        confirmation_id: String,
    },
}

impl ClientCommand {
    /// Build a user message command.
    pub fn message(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
        }
    }

    /// Build a plan approval.
    pub fn approve_plan(confirmation_id: impl Into<String>) -> Self {
        Self::ApprovePlan {
            confirmation_id: confirmation_id.into(),
        }
    }

    /// Build a plan rejection.
    pub fn reject_plan(confirmation_id: impl Into<String>) -> Self {
        Self::RejectPlan {
            confirmation_id: confirmation_id.into(),
        }
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
