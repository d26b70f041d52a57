//! Semantic retrieval over a knowledge snapshot
//!
//! Embeds the query through the embedding chain, then ranks the eligible
//! entries (published, requested language, optional category).

mod ranker;

pub use ranker::{SimilarityRanker, SimilarityResult, cosine_similarity};

use tracing::debug;

use crate::embedding::EmbeddingChain;
use crate::knowledge::{KnowledgeEntry, KnowledgeSnapshot, keyword_search};

/// Query parameters for a retrieval pass
#[derive(Debug, Clone)]
pub struct RetrievalQuery<'a> {
    pub text: &'a str,
    pub language: &'a str,
    pub category_id: Option<u64>,
    pub k: usize,
}

impl<'a> RetrievalQuery<'a> {
    pub fn new(text: &'a str, language: &'a str, k: usize) -> Self {
        Self {
            text,
            language,
            category_id: None,
            k,
        }
    }

    pub fn with_category(mut self, category_id: u64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Embedding chain plus ranker, wired at construction
#[derive(Debug, Clone)]
pub struct Retriever {
    embeddings: EmbeddingChain,
    ranker: SimilarityRanker,
}

impl Retriever {
    pub fn new(embeddings: EmbeddingChain) -> Self {
        let ranker = SimilarityRanker::new(embeddings.dimension());
        Self { embeddings, ranker }
    }

    pub fn embeddings(&self) -> &EmbeddingChain {
        &self.embeddings
    }

    /// Top `k` eligible entries for the query text
    pub async fn retrieve(
        &self,
        snapshot: &KnowledgeSnapshot,
        query: &RetrievalQuery<'_>,
    ) -> Vec<SimilarityResult> {
        if query.k == 0 {
            return Vec::new();
        }

        let embedding = self.embeddings.embed(query.text).await;
        let results = self.ranker.rank(
            &embedding.vector,
            snapshot
                .eligible(query.language, query.category_id)
                .filter(|e| e.comparable_with(&embedding.provider)),
            query.k,
        );

        debug!(
            provider = %embedding.provider,
            candidates = snapshot.len(),
            results = results.len(),
            top_score = results.first().map(|r| r.score),
            "Retrieval complete"
        );
        results
    }

    /// Keyword matches for entries semantic ranking may have missed
    pub fn keyword<'s>(
        &self,
        snapshot: &'s KnowledgeSnapshot,
        query: &RetrievalQuery<'_>,
    ) -> Vec<&'s KnowledgeEntry> {
        keyword_search(
            snapshot,
            query.text,
            query.language,
            query.category_id,
            query.k,
        )
    }
}
