//! Per-request pipeline: retrieve, build context, generate, moderate

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::synthesis::{SYNTHESIS_PROVIDER, suggest_questions, synthesize};
use super::{
    AttemptStatus, GenerationOutcome, GenerationStrategy, HostedStrategy, LocalStrategy,
    ProviderAttempt, StrategyReply, approximate_tokens,
};
use crate::config::Config;
use crate::context::{Context, ContextLimits};
use crate::conversation::ConversationTurn;
use crate::embedding::EmbeddingChain;
use crate::error::{Error, Result};
use crate::knowledge::{KnowledgeEntry, KnowledgeSnapshot};
use crate::llm::LlmClient;
use crate::moderation::ModerationFilter;
use crate::retrieval::{RetrievalQuery, Retriever};

/// Tunables for one orchestrator
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Entries retrieved per request
    pub top_k: usize,
    /// Score an entry needs before synthesis quotes it
    pub min_similarity: f32,
    pub limits: ContextLimits,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            min_similarity: config.retrieval.min_similarity,
            limits: ContextLimits::from(&config.context),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Generation pipeline with every collaborator wired at construction
pub struct Orchestrator {
    retriever: Retriever,
    strategies: Vec<Arc<dyn GenerationStrategy>>,
    moderation: ModerationFilter,
    settings: OrchestratorSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("retriever", &self.retriever)
            .field("strategies", &self.strategy_names())
            .field("moderation", &self.moderation)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        retriever: Retriever,
        strategies: Vec<Arc<dyn GenerationStrategy>>,
        moderation: ModerationFilter,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            retriever,
            strategies,
            moderation,
            settings,
        }
    }

    /// Build the embedding chain, strategy chain and filter named in `config`
    ///
    /// The hosted strategy is skipped with a warning when no API key is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let retriever = Retriever::new(EmbeddingChain::from_config(config)?);
        let generation = &config.generation;
        let mut strategies: Vec<Arc<dyn GenerationStrategy>> = Vec::new();

        for name in &generation.strategies {
            match name.as_str() {
                "hosted" => {
                    let api_key = generation
                        .resolved_api_key()
                        .map_err(|e| Error::ConfigError(e.to_string()))?;
                    let Some(api_key) = api_key else {
                        warn!(provider = "hosted", "No API key set, skipping hosted strategy");
                        continue;
                    };
                    let client = LlmClient::builder("hosted")
                        .api_key(api_key)
                        .base_url(&generation.base_url)
                        .model(&generation.hosted_model)
                        .temperature(generation.temperature)
                        .max_tokens(generation.max_tokens)
                        .timeout(generation.timeout())
                        .build()?;
                    strategies.push(Arc::new(HostedStrategy::new(client)));
                }
                "local" => {
                    let client = LlmClient::builder("local")
                        .base_url(&generation.local_base_url)
                        .model(&generation.local_model)
                        .temperature(generation.temperature)
                        .max_tokens(generation.max_tokens)
                        .timeout(generation.timeout())
                        .build()?;
                    strategies.push(Arc::new(LocalStrategy::new(client)));
                }
                other => {
                    return Err(Error::ConfigError(format!(
                        "unknown generation strategy '{}'",
                        other
                    )));
                }
            }
        }

        Ok(Self::new(
            retriever,
            strategies,
            ModerationFilter::from_config(&config.moderation),
            OrchestratorSettings::from_config(config),
        ))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn moderation(&self) -> &ModerationFilter {
        &self.moderation
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Configured strategies in priority order
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// Produce a reply for `message`
    ///
    /// Provider failures and timeouts never surface here; they advance the
    /// strategy chain and end in deterministic synthesis. The only error is
    /// `InvalidInput` for a blank message.
    pub async fn generate(
        &self,
        message: &str,
        history: &[ConversationTurn],
        snapshot: &KnowledgeSnapshot,
        language: &str,
        timeout: Duration,
    ) -> Result<GenerationOutcome> {
        if message.trim().is_empty() {
            return Err(Error::InvalidInput("message must not be empty".to_string()));
        }

        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let relevant = self
            .retriever
            .retrieve(
                snapshot,
                &RetrievalQuery::new(message, language, self.settings.top_k),
            )
            .await;
        let entries: Vec<KnowledgeEntry> = relevant.iter().map(|r| r.entry.clone()).collect();
        let context = Context::build(message, history, &entries, self.settings.limits);

        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut produced: Option<(String, StrategyReply)> = None;

        for strategy in &self.strategies {
            let attempt_started = Instant::now();
            let result = tokio::time::timeout(timeout, strategy.produce(&context)).await;
            let latency_ms = attempt_started.elapsed().as_millis() as u64;

            let status = match result {
                Ok(Ok(reply)) if !reply.text.trim().is_empty() => {
                    debug!(%request_id, provider = strategy.name(), latency_ms, "Strategy succeeded");
                    attempts.push(ProviderAttempt {
                        provider: strategy.name().to_string(),
                        status: AttemptStatus::Succeeded,
                        latency_ms,
                    });
                    produced = Some((strategy.name().to_string(), reply));
                    break;
                }
                Ok(Ok(_)) => failed(&Error::EmptyResponse(strategy.name().to_string())),
                Ok(Err(e)) => failed(&e),
                Err(_) => AttemptStatus::TimedOut,
            };

            if let AttemptStatus::Errored { code, reason } = &status {
                error!(
                    %request_id,
                    provider = strategy.name(),
                    latency_ms,
                    code = %code,
                    error = %reason,
                    "Generation strategy errored, trying next"
                );
            } else {
                warn!(
                    %request_id,
                    provider = strategy.name(),
                    latency_ms,
                    status = ?status,
                    "Generation strategy failed, trying next"
                );
            }
            attempts.push(ProviderAttempt {
                provider: strategy.name().to_string(),
                status,
                latency_ms,
            });
        }

        let (provider_used, text, usage) = match produced {
            Some((provider, reply)) => (provider, reply.text.trim().to_string(), reply.usage),
            None => {
                if !self.strategies.is_empty() {
                    info!(%request_id, attempts = attempts.len(), "Strategy chain exhausted, synthesizing reply");
                }
                (
                    SYNTHESIS_PROVIDER.to_string(),
                    synthesize(message, &relevant, self.settings.min_similarity),
                    None,
                )
            }
        };

        let (prompt_tokens, completion_tokens) = match usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (approximate_tokens(&context.render()), approximate_tokens(&text)),
        };

        let moderation = self.moderation.moderate(&text);
        let suggested_questions = suggest_questions(&relevant, self.settings.min_similarity);
        let latency_ms = started.elapsed().as_millis() as u64;

        info!(
            %request_id,
            provider = %provider_used,
            latency_ms,
            entries = relevant.len(),
            tokens = prompt_tokens + completion_tokens,
            flagged = moderation.flagged,
            "Reply generated"
        );

        Ok(GenerationOutcome {
            request_id,
            text,
            tokens_used: prompt_tokens + completion_tokens,
            prompt_tokens,
            completion_tokens,
            provider_used,
            latency_ms,
            relevant_entries: relevant,
            moderation,
            attempts,
            suggested_questions,
        })
    }
}

fn failed(error: &Error) -> AttemptStatus {
    let code = error.code().to_string();
    let reason = error.to_string();
    if error.is_provider_failure() {
        AttemptStatus::Failed { code, reason }
    } else {
        AttemptStatus::Errored { code, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TokenCounts;
    use crate::moderation::INAPPROPRIATE;
    use async_trait::async_trait;

    enum Behaviour {
        Reply(&'static str),
        ReplyWithUsage(&'static str, TokenCounts),
        Fail,
        Misconfigured,
        Stall,
    }

    struct Scripted {
        name: &'static str,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl GenerationStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn produce(&self, _context: &Context) -> Result<StrategyReply> {
            match &self.behaviour {
                Behaviour::Reply(text) => Ok(StrategyReply::new(*text)),
                Behaviour::ReplyWithUsage(text, usage) => {
                    Ok(StrategyReply::new(*text).with_usage(*usage))
                }
                Behaviour::Fail => Err(Error::ProviderUnavailable(format!("{} is down", self.name))),
                Behaviour::Misconfigured => {
                    Err(Error::ConfigError(format!("{} has no model set", self.name)))
                }
                Behaviour::Stall => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(StrategyReply::new("too late"))
                }
            }
        }
    }

    fn strategy(name: &'static str, behaviour: Behaviour) -> Arc<dyn GenerationStrategy> {
        Arc::new(Scripted { name, behaviour })
    }

    fn orchestrator(strategies: Vec<Arc<dyn GenerationStrategy>>) -> Orchestrator {
        Orchestrator::new(
            Retriever::new(EmbeddingChain::new(16, Duration::from_millis(100))),
            strategies,
            ModerationFilter::default(),
            OrchestratorSettings::default(),
        )
    }

    async fn run(orchestrator: &Orchestrator, message: &str) -> Result<GenerationOutcome> {
        orchestrator
            .generate(
                message,
                &[],
                &KnowledgeSnapshot::default(),
                "en",
                Duration::from_secs(1),
            )
            .await
    }

    #[tokio::test]
    async fn test_blank_message_is_invalid_input() {
        let err = run(&orchestrator(vec![]), "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_chain_greets() {
        let outcome = run(&orchestrator(vec![]), "hello").await.unwrap();

        assert_eq!(outcome.text, "Hello! How can I help you today?");
        assert_eq!(outcome.provider_used, SYNTHESIS_PROVIDER);
        assert!(outcome.is_degraded());
        assert!(outcome.attempts.is_empty());
        assert!(!outcome.moderation.flagged);
        assert_eq!(outcome.suggested_questions.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_advances_to_next_strategy() {
        let orchestrator = orchestrator(vec![
            strategy("hosted", Behaviour::Stall),
            strategy("local", Behaviour::Reply("Shipping takes five days.")),
        ]);

        let outcome = run(&orchestrator, "How long is shipping?").await.unwrap();

        assert_eq!(outcome.provider_used, "local");
        assert_eq!(outcome.text, "Shipping takes five days.");
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].provider, "hosted");
        assert_eq!(outcome.attempts[0].status, AttemptStatus::TimedOut);
        assert!(outcome.attempts[0].latency_ms >= 1000);
        assert!(outcome.attempts[1].succeeded());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_with_code() {
        let orchestrator = orchestrator(vec![
            strategy("hosted", Behaviour::Fail),
            strategy("blank", Behaviour::Reply("  ")),
            strategy("local", Behaviour::Reply("Answer.")),
        ]);

        let outcome = run(&orchestrator, "question").await.unwrap();

        assert_eq!(outcome.provider_used, "local");
        match &outcome.attempts[0].status {
            AttemptStatus::Failed { code, .. } => assert_eq!(code, "E100"),
            other => panic!("unexpected status {:?}", other),
        }
        match &outcome.attempts[1].status {
            AttemptStatus::Failed { code, .. } => assert_eq!(code, "E131"),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_provider_error_is_recorded_apart_but_advances() {
        let orchestrator = orchestrator(vec![
            strategy("hosted", Behaviour::Misconfigured),
            strategy("backup", Behaviour::Fail),
            strategy("local", Behaviour::Reply("Answer.")),
        ]);

        let outcome = run(&orchestrator, "question").await.unwrap();

        assert_eq!(outcome.provider_used, "local");
        assert_eq!(outcome.attempts.len(), 3);
        match &outcome.attempts[0].status {
            AttemptStatus::Errored { code, reason } => {
                assert_eq!(code, "E600");
                assert!(reason.contains("hosted has no model set"));
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert!(matches!(outcome.attempts[1].status, AttemptStatus::Failed { .. }));
        assert!(outcome.attempts[2].succeeded());
    }

    #[tokio::test]
    async fn test_exhausted_chain_still_answers() {
        let orchestrator = orchestrator(vec![
            strategy("hosted", Behaviour::Fail),
            strategy("local", Behaviour::Fail),
        ]);

        let outcome = run(&orchestrator, "Where is my parcel?").await.unwrap();

        assert_eq!(outcome.provider_used, SYNTHESIS_PROVIDER);
        assert!(!outcome.text.trim().is_empty());
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts.iter().all(|a| !a.succeeded()));
    }

    #[tokio::test]
    async fn test_token_counts() {
        let approximate = run(
            &orchestrator(vec![strategy("local", Behaviour::Reply("one two three"))]),
            "count these words",
        )
        .await
        .unwrap();
        assert_eq!(approximate.completion_tokens, 3);
        // "User: count these words" + "Assistant:"
        assert_eq!(approximate.prompt_tokens, 5);
        assert_eq!(approximate.tokens_used, 8);

        let usage = TokenCounts {
            prompt_tokens: 40,
            completion_tokens: 7,
        };
        let exact = run(
            &orchestrator(vec![strategy("hosted", Behaviour::ReplyWithUsage("ok", usage))]),
            "count these words",
        )
        .await
        .unwrap();
        assert_eq!(exact.prompt_tokens, 40);
        assert_eq!(exact.tokens_used, 47);
    }

    #[tokio::test]
    async fn test_moderation_annotates_without_blocking() {
        let orchestrator = orchestrator(vec![strategy("local", Behaviour::Reply("I hate waiting too."))]);

        let outcome = run(&orchestrator, "The queue is slow").await.unwrap();

        assert_eq!(outcome.text, "I hate waiting too.");
        assert!(outcome.moderation.flagged);
        assert!(outcome.moderation.score(INAPPROPRIATE).unwrap() >= 0.8);
    }

    #[test]
    fn test_from_config_without_strategies() {
        let mut config = Config::default();
        config.embedding.providers = vec!["local".to_string()];
        config.generation.strategies = Vec::new();

        let orchestrator = Orchestrator::from_config(&config).unwrap();
        assert!(orchestrator.strategy_names().is_empty());
        assert_eq!(orchestrator.settings().top_k, 3);
    }

    #[test]
    fn test_from_config_local_strategy() {
        let mut config = Config::default();
        config.embedding.providers = vec!["local".to_string()];
        config.generation.strategies = vec!["local".to_string()];

        let orchestrator = Orchestrator::from_config(&config).unwrap();
        assert_eq!(orchestrator.strategy_names(), vec!["local"]);
    }
}
