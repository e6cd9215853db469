//! Block accumulation for in-flight assistant messages.
//!
//! [`BlockStore`] runs two symmetric state machines, one per [`BlockKind`]:
//!
//! ```text
//! (absent) --start--> pending (invisible) --update(non-empty)--> streaming --complete--> completed
//!    \___________________________update(non-empty)______________/
//! ```
//!
//! A started block stays invisible until it receives text, so an
//! [`AssistantMessage`] only ever exists once it has something to show.
//! Updates replace the block's text wholesale. Completion is final: later
//! updates to a completed block are ignored.
//!
//! At most one block of each kind per message streams at a time. Creating a
//! new streaming block completes any sibling of the same kind.

use chrono::{DateTime, Utc};
use log::debug;

use crate::message::{AssistantMessage, Block, BlockKind};

/// Result of an [`BlockStore::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new visible block (and possibly its message) was created.
    Created,
    /// An existing block's text was replaced.
    Updated,
    /// The block already held exactly this text.
    Unchanged,
    /// Nothing visible changed (empty text, or the block was already completed).
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingBlock {
    kind: BlockKind,
    message_id: String,
    block_id: String,
    seq: u64,
    started_at: DateTime<Utc>,
}

/// In-flight assistant messages, in creation order.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    messages: Vec<AssistantMessage>,
    pending: Vec<PendingBlock>,
}

impl BlockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All visible in-flight messages.
    pub fn messages(&self) -> &[AssistantMessage] {
        &self.messages
    }

    /// Look up an in-flight message.
    pub fn get(&self, message_id: &str) -> Option<&AssistantMessage> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Look up a visible block.
    pub fn block(&self, kind: BlockKind, message_id: &str, block_id: &str) -> Option<&Block> {
        self.get(message_id)?.block(kind, block_id)
    }

    /// The block of `kind` currently streaming in `message_id`.
    pub fn open_block(&self, kind: BlockKind, message_id: &str) -> Option<&Block> {
        self.get(message_id)?.streaming_block(kind)
    }

    /// True if a block with this id was started but has not received text yet.
    pub fn is_pending(&self, kind: BlockKind, message_id: &str, block_id: &str) -> bool {
        self.pending
            .iter()
            .any(|p| p.kind == kind && p.message_id == message_id && p.block_id == block_id)
    }

    /// Register a streaming block without making it visible.
    ///
    /// No-op if the block already exists (visible or pending).
    pub fn start(&mut self, kind: BlockKind, message_id: &str, block_id: &str, seq: u64) {
        if self.block(kind, message_id, block_id).is_some()
            || self.is_pending(kind, message_id, block_id)
        {
            return;
        }
        self.pending.push(PendingBlock {
            kind,
            message_id: message_id.to_string(),
            block_id: block_id.to_string(),
            seq,
            started_at: Utc::now(),
        });
    }

    /// Replace a block's text, creating the message and block if needed.
    ///
    /// `seq` is only used when the block is created without a prior
    /// [`start`](Self::start); a started block keeps the sequence and
    /// timestamp it was started with.
    pub fn update(
        &mut self,
        kind: BlockKind,
        message_id: &str,
        block_id: &str,
        content: &str,
        seq: u64,
    ) -> UpdateOutcome {
        if let Some(block) = self.block_mut(kind, message_id, block_id) {
            if !block.is_streaming {
                debug!("ignoring update to completed {:?} block {}", kind, block_id);
                return UpdateOutcome::Ignored;
            }
            if content.is_empty() {
                return UpdateOutcome::Ignored;
            }
            if block.content == content {
                return UpdateOutcome::Unchanged;
            }
            block.content = content.to_string();
            return UpdateOutcome::Updated;
        }

        if content.is_empty() {
            self.start(kind, message_id, block_id, seq);
            return UpdateOutcome::Ignored;
        }

        let pending = self.take_pending(kind, message_id, block_id);
        let message = self.message_entry(message_id);
        let blocks = message.blocks_mut(kind);
        for sibling in blocks.iter_mut().filter(|b| b.is_streaming) {
            debug!("completing {:?} block {} superseded by {}", kind, sibling.id, block_id);
            sibling.is_streaming = false;
        }
        let mut block = match pending {
            Some(pending) => {
                let mut block = Block::new(block_id, pending.seq);
                block.timestamp = pending.started_at;
                block
            }
            None => Block::new(block_id, seq),
        };
        block.content = content.to_string();
        blocks.push(block);
        UpdateOutcome::Created
    }

    /// Stop a block streaming. Returns false if no such block exists.
    pub fn complete(&mut self, kind: BlockKind, message_id: &str, block_id: &str) -> bool {
        if self.take_pending(kind, message_id, block_id).is_some() {
            return true;
        }
        match self.block_mut(kind, message_id, block_id) {
            Some(block) => {
                block.is_streaming = false;
                true
            }
            None => false,
        }
    }

    /// Complete whichever block of `kind` is streaming in `message_id`.
    ///
    /// Returns the completed block's id.
    pub fn complete_open(&mut self, kind: BlockKind, message_id: &str) -> Option<String> {
        self.pending
            .retain(|p| !(p.kind == kind && p.message_id == message_id));
        let message = self.messages.iter_mut().find(|m| m.id == message_id)?;
        let block = message
            .blocks_mut(kind)
            .iter_mut()
            .find(|b| b.is_streaming)?;
        block.is_streaming = false;
        Some(block.id.clone())
    }

    /// Move everything accumulated under `from` to `to`.
    ///
    /// The old entry is dropped. Blocks keep their ids and sequence numbers;
    /// when `to` already exists the two collections are merged in sequence
    /// order. Returns the number of visible blocks moved.
    pub fn migrate(&mut self, from: &str, to: &str) -> usize {
        if from == to {
            return 0;
        }

        for pending in self.pending.iter_mut().filter(|p| p.message_id == from) {
            pending.message_id = to.to_string();
        }

        let Some(pos) = self.messages.iter().position(|m| m.id == from) else {
            return 0;
        };
        let mut old = self.messages.remove(pos);
        let moved = old.reasoning_blocks.len() + old.answer_blocks.len();

        match self.messages.iter().position(|m| m.id == to) {
            Some(target) => {
                let target = &mut self.messages[target];
                for kind in [BlockKind::Reasoning, BlockKind::Answer] {
                    let blocks = target.blocks_mut(kind);
                    blocks.append(old.blocks_mut(kind));
                    blocks.sort_by_key(|b| b.seq);
                    keep_latest_streaming(blocks);
                }
            }
            None => {
                old.id = to.to_string();
                self.messages.insert(pos, old);
            }
        }

        debug!("migrated {} block(s) from message {} to {}", moved, from, to);
        moved
    }

    /// Remove a message for finalization, completing all of its blocks.
    pub fn take(&mut self, message_id: &str) -> Option<AssistantMessage> {
        self.pending.retain(|p| p.message_id != message_id);
        let pos = self.messages.iter().position(|m| m.id == message_id)?;
        let mut message = self.messages.remove(pos);
        for block in message
            .reasoning_blocks
            .iter_mut()
            .chain(message.answer_blocks.iter_mut())
        {
            block.is_streaming = false;
        }
        message.is_complete = true;
        Some(message)
    }

    /// Drop every in-flight message and pending block.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending.clear();
    }

    fn block_mut(&mut self, kind: BlockKind, message_id: &str, block_id: &str) -> Option<&mut Block> {
        self.messages
            .iter_mut()
            .find(|m| m.id == message_id)?
            .blocks_mut(kind)
            .iter_mut()
            .find(|b| b.id == block_id)
    }

    fn message_entry(&mut self, message_id: &str) -> &mut AssistantMessage {
        let pos = match self.messages.iter().position(|m| m.id == message_id) {
            Some(pos) => pos,
            None => {
                debug!("creating in-flight message {}", message_id);
                self.messages.push(AssistantMessage::new(message_id));
                self.messages.len() - 1
            }
        };
        &mut self.messages[pos]
    }

    fn take_pending(
        &mut self,
        kind: BlockKind,
        message_id: &str,
        block_id: &str,
    ) -> Option<PendingBlock> {
        let pos = self
            .pending
            .iter()
            .position(|p| p.kind == kind && p.message_id == message_id && p.block_id == block_id)?;
        Some(self.pending.remove(pos))
    }
}

/// Leave only the most recent streaming block streaming.
fn keep_latest_streaming(blocks: &mut [Block]) {
    let Some(latest) = blocks.iter().rposition(|b| b.is_streaming) else {
        return;
    };
    for (i, block) in blocks.iter_mut().enumerate() {
        if i != latest {
            block.is_streaming = false;
        }
    }
}

#[cfg(test)]
#[path = "accumulator_tests.rs"]
mod tests;
