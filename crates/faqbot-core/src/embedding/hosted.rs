//! Remote embedding model behind an OpenAI-compatible endpoint

use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::error::Result;
use crate::llm::LlmClient;

#[derive(Debug, Clone)]
pub struct HostedEmbedder {
    client: LlmClient,
    dimension: usize,
}

impl HostedEmbedder {
    pub fn new(client: LlmClient, dimension: usize) -> Self {
        Self { client, dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for HostedEmbedder {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text, Some(self.dimension)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_with_provider_unavailable() {
        let client = LlmClient::builder("hosted")
            .base_url("http://127.0.0.1:1/v1")
            .model("text-embedding-3-small")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let embedder = HostedEmbedder::new(client, 384);

        assert_eq!(embedder.name(), "hosted");
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
    }
}
