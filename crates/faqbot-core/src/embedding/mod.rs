//! Embedding providers and the fallback chain
//!
//! This module provides:
//! - `EmbeddingProvider`, the single `embed` capability every backend implements
//! - Hosted, in-process and structural implementations
//! - `EmbeddingChain`, which tries providers in priority order and always
//!   ends with the structural fallback, so embedding generation is total

mod fallback;
mod hosted;
mod local;

pub use fallback::StructuralEmbedder;
pub use hosted::HostedEmbedder;
pub use local::LocalEmbedder;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeEntry;
use crate::llm::LlmClient;

/// Converts text into a fixed-length vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider identity used in logs and error messages
    fn name(&self) -> &str;

    /// Either a full vector or an error, never a partial result
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A vector plus the provider that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub provider: String,
}

/// Ordered provider list with the structural fallback always last
#[derive(Clone)]
pub struct EmbeddingChain {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    fallback: StructuralEmbedder,
    timeout: Duration,
}

impl std::fmt::Debug for EmbeddingChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingChain")
            .field("providers", &self.provider_names())
            .field("dimension", &self.dimension())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EmbeddingChain {
    /// Chain with no configured providers; only the structural fallback answers
    pub fn new(dimension: usize, timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            fallback: StructuralEmbedder::new(dimension),
            timeout,
        }
    }

    /// Append a provider after the ones already configured
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the chain named by `embedding.providers`
    ///
    /// The hosted provider is skipped with a warning when no API key is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedding = &config.embedding;
        let mut chain = Self::new(embedding.dimension, embedding.timeout());

        for name in &embedding.providers {
            match name.as_str() {
                "hosted" => {
                    let api_key = config
                        .generation
                        .resolved_api_key()
                        .map_err(|e| Error::ConfigError(e.to_string()))?;
                    let Some(api_key) = api_key else {
                        warn!(provider = "hosted", "No API key set, skipping hosted embeddings");
                        continue;
                    };
                    let client = LlmClient::builder("hosted")
                        .api_key(api_key)
                        .base_url(&config.generation.base_url)
                        .model(&embedding.hosted_model)
                        .timeout(embedding.timeout())
                        .build()?;
                    chain = chain.with_provider(Arc::new(HostedEmbedder::new(
                        client,
                        embedding.dimension,
                    )));
                }
                "local" => {
                    chain = chain.with_provider(Arc::new(LocalEmbedder::load(
                        embedding.dimension,
                        embedding.stopwords_path.as_deref(),
                    )));
                }
                other => {
                    return Err(Error::ConfigError(format!(
                        "unknown embedding provider '{}'",
                        other
                    )));
                }
            }
        }

        Ok(chain)
    }

    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    /// Configured providers in priority order, followed by the structural fallback
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .chain(std::iter::once(self.fallback.name().to_string()))
            .collect()
    }

    /// Embed `text`, falling through providers on failure, timeout or wrong length
    pub async fn embed(&self, text: &str) -> Embedding {
        let dimension = self.dimension();

        for provider in &self.providers {
            let outcome = match tokio::time::timeout(self.timeout, provider.embed(text)).await {
                Ok(Ok(vector)) if vector.len() == dimension => {
                    debug!(provider = provider.name(), "Embedding generated");
                    return Embedding {
                        vector,
                        provider: provider.name().to_string(),
                    };
                }
                Ok(Ok(vector)) => Error::MalformedVector {
                    expected: dimension,
                    actual: vector.len(),
                },
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout {
                    provider: provider.name().to_string(),
                    millis: self.timeout.as_millis() as u64,
                },
            };

            if outcome.is_provider_failure() {
                warn!(
                    provider = provider.name(),
                    code = outcome.code(),
                    error = %outcome,
                    "Embedding provider failed, trying next"
                );
            } else {
                error!(
                    provider = provider.name(),
                    code = outcome.code(),
                    error = %outcome,
                    "Embedding provider errored, trying next"
                );
            }
        }

        Embedding {
            vector: self.fallback.features(text),
            provider: self.fallback.name().to_string(),
        }
    }

    /// Fill in both vectors of an entry whose text was created or changed
    ///
    /// Both vectors must come from one provider. When the answer falls
    /// through to a different provider than the question, only the question
    /// vector is kept.
    pub async fn index_entry(&self, entry: &mut KnowledgeEntry) {
        let question = self.embed(&entry.question).await;
        let answer = self.embed(&entry.answer).await;

        if answer.provider != question.provider {
            debug!(
                entry_id = entry.id,
                question_provider = %question.provider,
                answer_provider = %answer.provider,
                "Answer embedded by a different provider, keeping question vector only"
            );
            entry.answer_vector = None;
        } else {
            entry.answer_vector = Some(answer.vector);
        }
        entry.question_vector = Some(question.vector);
        entry.vector_provider = Some(question.provider);
    }
}
