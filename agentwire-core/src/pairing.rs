//! Reasoning/answer pairing.
//!
//! A message's reasoning and answer blocks live in two separate collections.
//! For display they are re-interleaved into [`ReasoningAnswerPair`]s: each
//! reasoning block followed by the answer it led to.
//!
//! Both collections are merged and ordered by receipt sequence (ties broken by
//! collection position, reasoning first). Scanning that order, every reasoning
//! block claims the nearest unclaimed answer that comes after it. Arrival order
//! decides; the answer's own sequence relative to the reasoning is not checked
//! again. Answers nobody claimed become answer-only pairs. Block counts per
//! message are small, so the quadratic forward scan is fine.

use crate::message::{AssistantMessage, Block, BlockKind, Message};

/// Position of a block inside its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedBlock {
    /// Block id.
    pub block_id: String,
    /// Index in the message's reasoning or answer collection.
    pub index: usize,
}

/// A reasoning block and the answer that followed it. Either side may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningAnswerPair {
    pub reasoning: Option<PairedBlock>,
    pub answer: Option<PairedBlock>,
    /// Sequence of the pair's leading block.
    pub seq: u64,
    /// Creation order during pairing; secondary sort key.
    pub pair_index: usize,
}

impl ReasoningAnswerPair {
    /// Block ids in display order: reasoning always before answer.
    pub fn block_ids(&self) -> impl Iterator<Item = &str> {
        self.reasoning
            .iter()
            .chain(self.answer.iter())
            .map(|b| b.block_id.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Item {
    kind: BlockKind,
    index: usize,
    seq: u64,
    tie_break: usize,
}

/// Pair a message's reasoning blocks with its answer blocks.
pub fn pair_blocks(reasoning: &[Block], answers: &[Block]) -> Vec<ReasoningAnswerPair> {
    let mut items: Vec<Item> = reasoning
        .iter()
        .enumerate()
        .map(|(index, b)| Item {
            kind: BlockKind::Reasoning,
            index,
            seq: b.seq,
            tie_break: index,
        })
        .chain(answers.iter().enumerate().map(|(index, b)| Item {
            kind: BlockKind::Answer,
            index,
            seq: b.seq,
            tie_break: reasoning.len() + index,
        }))
        .collect();
    items.sort_by_key(|item| (item.seq, item.tie_break));

    let paired = |kind: BlockKind, index: usize| PairedBlock {
        block_id: match kind {
            BlockKind::Reasoning => reasoning[index].id.clone(),
            BlockKind::Answer => answers[index].id.clone(),
        },
        index,
    };

    let mut consumed = vec![false; items.len()];
    let mut pairs = Vec::new();

    for i in 0..items.len() {
        let item = items[i];
        if item.kind != BlockKind::Reasoning {
            continue;
        }

        let answer = ((i + 1)..items.len())
            .find(|&j| items[j].kind == BlockKind::Answer && !consumed[j])
            .map(|j| {
                consumed[j] = true;
                paired(BlockKind::Answer, items[j].index)
            });

        pairs.push(ReasoningAnswerPair {
            reasoning: Some(paired(BlockKind::Reasoning, item.index)),
            answer,
            seq: item.seq,
            pair_index: pairs.len(),
        });
    }

    for (j, item) in items.iter().enumerate() {
        if item.kind == BlockKind::Answer && !consumed[j] {
            pairs.push(ReasoningAnswerPair {
                reasoning: None,
                answer: Some(paired(BlockKind::Answer, item.index)),
                seq: item.seq,
                pair_index: pairs.len(),
            });
        }
    }

    pairs.sort_by_key(|p| (p.seq, p.pair_index));
    pairs
}

impl AssistantMessage {
    /// Reasoning/answer pairs for the blocks received so far.
    pub fn pairs(&self) -> Vec<ReasoningAnswerPair> {
        pair_blocks(&self.reasoning_blocks, &self.answer_blocks)
    }
}

impl Message {
    /// Reasoning/answer pairs for a finalized assistant message. Empty for plain messages.
    pub fn pairs(&self) -> Vec<ReasoningAnswerPair> {
        pair_blocks(self.reasoning_blocks(), self.answer_blocks())
    }
}

#[cfg(test)]
#[path = "pairing_tests.rs"]
mod tests;
