//! Bounded conversational context assembly
//!
//! A context is an ordered list of labeled segments:
//!
//! 1. the most recent history turns, oldest first
//! 2. the top-ranked knowledge entries, in rank order
//! 3. the new user message
//! 4. a generation cue marking where the reply begins
//!
//! The rendered prompt is kept within a character budget by dropping the
//! oldest history turns first, then the lowest-ranked knowledge entries.
//! The message and the cue are never dropped or truncated.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ContextConfig;
use crate::conversation::{ConversationTurn, TurnRole, recent_turns};
use crate::knowledge::KnowledgeEntry;

/// Header rendered once before the first knowledge segment
const KNOWLEDGE_HEADER: &str = "Relevant information:";

/// Text of the generation cue
pub const GENERATION_CUE: &str = "Assistant:";

/// One labeled piece of a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Turn { role: TurnRole, content: String },
    Knowledge { entry_id: u64, question: String, answer: String },
    Message { content: String },
    Cue,
}

/// Limits applied while building a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_turns: usize,
    pub max_entries: usize,
    /// Character budget for the rendered prompt
    pub max_chars: usize,
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            max_entries: config.max_entries,
            max_chars: config.max_chars,
        }
    }
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

/// Assembled context ready for a generation strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    turns: Vec<ConversationTurn>,
    knowledge: Vec<KnowledgeEntry>,
    message: String,
    /// Turns removed to fit the budget
    pub dropped_turns: usize,
    /// Knowledge entries removed to fit the budget
    pub dropped_entries: usize,
}

impl Context {
    /// Build a context from history, ranked entries and the new message
    pub fn build(
        message: &str,
        history: &[ConversationTurn],
        top_entries: &[KnowledgeEntry],
        limits: ContextLimits,
    ) -> Self {
        let mut context = Self {
            turns: recent_turns(history, limits.max_turns).to_vec(),
            knowledge: top_entries.iter().take(limits.max_entries).cloned().collect(),
            message: message.to_string(),
            dropped_turns: 0,
            dropped_entries: 0,
        };

        while context.char_len() > limits.max_chars {
            if !context.turns.is_empty() {
                context.turns.remove(0);
                context.dropped_turns += 1;
            } else if context.knowledge.pop().is_some() {
                context.dropped_entries += 1;
            } else {
                break;
            }
        }

        if context.dropped_turns > 0 || context.dropped_entries > 0 {
            debug!(
                dropped_turns = context.dropped_turns,
                dropped_entries = context.dropped_entries,
                chars = context.char_len(),
                budget = limits.max_chars,
                "Context trimmed to budget"
            );
        }

        context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn knowledge(&self) -> &[KnowledgeEntry] {
        &self.knowledge
    }

    /// Segments in prompt order
    pub fn segments(&self) -> Vec<Segment> {
        let turns = self.turns.iter().map(|t| Segment::Turn {
            role: t.role,
            content: t.content.clone(),
        });
        let knowledge = self.knowledge.iter().map(|e| Segment::Knowledge {
            entry_id: e.id,
            question: e.question.clone(),
            answer: e.answer.clone(),
        });

        turns
            .chain(knowledge)
            .chain([
                Segment::Message {
                    content: self.message.clone(),
                },
                Segment::Cue,
            ])
            .collect()
    }

    /// The knowledge block alone, or `None` when no entries survived
    pub fn knowledge_block(&self) -> Option<String> {
        if self.knowledge.is_empty() {
            return None;
        }
        let mut block = KNOWLEDGE_HEADER.to_string();
        for entry in &self.knowledge {
            block.push_str(&format!("\nQ: {}\nA: {}", entry.question, entry.answer));
        }
        Some(block)
    }

    /// Flat prompt for completion-style models
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.content))
            .collect();
        lines.extend(self.knowledge_block());
        lines.push(format!("{}: {}", TurnRole::User.label(), self.message));
        lines.push(GENERATION_CUE.to_string());
        lines.join("\n")
    }

    /// Rendered size in characters
    pub fn char_len(&self) -> usize {
        self.render().chars().count()
    }
}
