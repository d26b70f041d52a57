//! Reply generation with an ordered strategy fallback chain
//!
//! This module provides:
//! - `GenerationStrategy`, the `produce(context)` capability shared by the
//!   hosted and local model strategies
//! - Deterministic synthesis, the terminal fallback that never fails
//! - `Orchestrator`, which runs retrieval, context building, the strategy
//!   chain and moderation for one request

mod orchestrator;
mod strategies;
mod synthesis;

pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use strategies::{HostedStrategy, LocalStrategy};
pub use synthesis::{Intent, SYNTHESIS_PROVIDER, detect_intent, suggest_questions, synthesize};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;
use crate::error::Result;
use crate::llm::TokenCounts;
use crate::moderation::ModerationResult;
use crate::retrieval::SimilarityResult;

/// Text produced by a strategy, with exact usage when the provider reports it
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyReply {
    pub text: String,
    pub usage: Option<TokenCounts>,
}

impl StrategyReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenCounts) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Produces reply text from an assembled context
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    /// Strategy identity recorded as `provider_used`
    fn name(&self) -> &str;

    async fn produce(&self, context: &Context) -> Result<StrategyReply>;
}

/// How a single strategy attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    /// The provider was unreachable, rate limited or returned nothing usable
    Failed { code: String, reason: String },
    /// A non-provider error such as bad configuration or I/O
    Errored { code: String, reason: String },
    TimedOut,
}

/// One entry of the per-request attempt log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    #[serde(flatten)]
    pub status: AttemptStatus,
    pub latency_ms: u64,
}

impl ProviderAttempt {
    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }
}

/// Everything the caller needs to render and persist a reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub request_id: Uuid,
    pub text: String,
    pub tokens_used: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub provider_used: String,
    pub latency_ms: u64,
    pub relevant_entries: Vec<SimilarityResult>,
    pub moderation: ModerationResult,
    pub attempts: Vec<ProviderAttempt>,
    pub suggested_questions: Vec<String>,
}

impl GenerationOutcome {
    /// True when no configured strategy answered and the reply was synthesized
    pub fn is_degraded(&self) -> bool {
        self.provider_used == SYNTHESIS_PROVIDER
    }
}

/// Whitespace-delimited word count, the token approximation used when a
/// provider does not report usage
pub fn approximate_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
