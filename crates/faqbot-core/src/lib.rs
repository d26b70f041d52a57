//! Faqbot Core Library
//!
//! This crate provides the reply pipeline of the FAQ assistant, including:
//! - Embedding providers with a total fallback chain
//! - Similarity ranking over an immutable knowledge snapshot
//! - Bounded context assembly
//! - Generation strategies with ordered fallback and deterministic synthesis
//! - Advisory content moderation
//! - OpenAI-compatible model client and configuration

pub mod config;
pub mod context;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod llm;
pub mod moderation;
pub mod retrieval;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::conversation::{ConversationTurn, TurnRole};
    pub use crate::error::{Error, Result};
    pub use crate::generation::{GenerationOutcome, Orchestrator};
    pub use crate::knowledge::{EntryStatus, KnowledgeEntry, KnowledgeSnapshot, SnapshotStore};
    pub use crate::retrieval::SimilarityResult;
}
