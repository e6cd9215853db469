//! Conversation view-model types.
//!
//! An [`AssistantMessage`] is the in-flight accumulation of one assistant turn:
//! two collections of streamed [`Block`]s, one for reasoning and one for the
//! answer. When the turn completes it is folded into an immutable [`Message`],
//! which keeps the blocks in its [`MessageMetadata`] so the reasoning/answer
//! pairing can still be reconstructed for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user.
    User,
    /// Message produced by the agent.
    Assistant,
    /// Client-generated notice (errors, status).
    System,
}

impl Role {
    /// Parse a wire role name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Which of the two block collections a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Model reasoning, tool calls and tool results.
    Reasoning,
    /// User-facing answer text.
    Answer,
}

/// A unit of streamed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Block id, unique within the session.
    pub id: String,
    /// Full current text. Updates replace it wholesale.
    pub content: String,
    /// True from creation until the block is completed; never set again afterwards.
    pub is_streaming: bool,
    /// Receipt sequence of the event that started the block. Orders blocks for pairing.
    pub seq: u64,
    /// Wall-clock time the block was started.
    pub timestamp: DateTime<Utc>,
}

impl Block {
    pub(crate) fn new(id: impl Into<String>, seq: u64) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            is_streaming: true,
            seq,
            timestamp: Utc::now(),
        }
    }
}

/// An assistant turn that is still receiving events.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    /// Message id (the dispatcher's message cursor when the turn began).
    pub id: String,
    /// Reasoning blocks in creation order.
    pub reasoning_blocks: Vec<Block>,
    /// Answer blocks in creation order.
    pub answer_blocks: Vec<Block>,
    /// Set once the owning message has completed.
    pub is_complete: bool,
}

impl AssistantMessage {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reasoning_blocks: Vec::new(),
            answer_blocks: Vec::new(),
            is_complete: false,
        }
    }

    /// Blocks of one kind.
    pub fn blocks(&self, kind: BlockKind) -> &[Block] {
        match kind {
            BlockKind::Reasoning => &self.reasoning_blocks,
            BlockKind::Answer => &self.answer_blocks,
        }
    }

    pub(crate) fn blocks_mut(&mut self, kind: BlockKind) -> &mut Vec<Block> {
        match kind {
            BlockKind::Reasoning => &mut self.reasoning_blocks,
            BlockKind::Answer => &mut self.answer_blocks,
        }
    }

    /// Look up a block by id.
    pub fn block(&self, kind: BlockKind, block_id: &str) -> Option<&Block> {
        self.blocks(kind).iter().find(|b| b.id == block_id)
    }

    /// The block of this kind that is currently streaming, if any.
    pub fn streaming_block(&self, kind: BlockKind) -> Option<&Block> {
        self.blocks(kind).iter().find(|b| b.is_streaming)
    }

    /// True if neither collection holds any block.
    pub fn is_empty(&self) -> bool {
        self.reasoning_blocks.is_empty() && self.answer_blocks.is_empty()
    }

    /// Answer text as it will appear in the finalized message.
    pub fn answer_text(&self) -> String {
        self.answer_blocks
            .iter()
            .map(|b| b.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Provenance kept on finalized assistant messages.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageMetadata {
    /// Id of the in-flight message this was folded from.
    pub message_id: String,
    /// Reasoning blocks, all completed.
    pub reasoning_blocks: Vec<Block>,
    /// Answer blocks, all completed.
    pub answer_blocks: Vec<Block>,
}

/// A finalized conversation entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// A plain message without block metadata.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// A client-generated system notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Fold a completed in-flight message. `fallback` is used when no answer block has text.
    pub(crate) fn from_assistant(message: AssistantMessage, fallback: Option<String>) -> Self {
        let mut content = message.answer_text();
        if content.is_empty() {
            content = fallback.map(|c| c.trim().to_string()).unwrap_or_default();
        }

        Self {
            role: Role::Assistant,
            content,
            timestamp: Utc::now(),
            metadata: Some(MessageMetadata {
                message_id: message.id,
                reasoning_blocks: message.reasoning_blocks,
                answer_blocks: message.answer_blocks,
            }),
        }
    }

    /// Reasoning blocks carried over from the in-flight message, if any.
    pub fn reasoning_blocks(&self) -> &[Block] {
        self.metadata
            .as_ref()
            .map(|m| m.reasoning_blocks.as_slice())
            .unwrap_or(&[])
    }

    /// Answer blocks carried over from the in-flight message, if any.
    pub fn answer_blocks(&self) -> &[Block] {
        self.metadata
            .as_ref()
            .map(|m| m.answer_blocks.as_slice())
            .unwrap_or(&[])
    }
}
