//! Structural feature embedding, the terminal fallback

use std::collections::HashSet;

use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::error::Result;

/// Cheap text statistics zero-padded (or truncated) to the configured dimension
///
/// Features, in order: word count / 100, character count / 500, vocabulary
/// diversity (unique words / words), mean word length. Never fails.
#[derive(Debug, Clone)]
pub struct StructuralEmbedder {
    dimension: usize,
}

impl StructuralEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn features(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let word_count = words.len();
        let unique: HashSet<&str> = words.iter().copied().collect();
        let total_word_len: usize = words.iter().map(|w| w.chars().count()).sum();
        let denominator = word_count.max(1) as f32;

        let mut vector = vec![
            word_count as f32 / 100.0,
            text.chars().count() as f32 / 500.0,
            unique.len() as f32 / denominator,
            total_word_len as f32 / denominator,
        ];
        vector.resize(self.dimension, 0.0);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for StructuralEmbedder {
    fn name(&self) -> &str {
        "structural"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.features(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features() {
        let embedder = StructuralEmbedder::new(6);
        let v = embedder.features("the cat the dog");

        assert_eq!(v.len(), 6);
        assert!((v[0] - 0.04).abs() < 1e-6);
        assert!((v[1] - 15.0 / 500.0).abs() < 1e-6);
        assert!((v[2] - 0.75).abs() < 1e-6);
        assert!((v[3] - 3.0).abs() < 1e-6);
        assert_eq!(&v[4..], &[0.0, 0.0]);
    }

    #[test]
    fn test_truncates_small_dimensions() {
        let v = StructuralEmbedder::new(2).features("hello world");
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = StructuralEmbedder::new(4).features("");
        assert_eq!(v, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn test_embed_never_fails() {
        let embedder = StructuralEmbedder::new(384);
        let v = embedder.embed("anything at all").await.unwrap();
        assert_eq!(v.len(), 384);
    }
}
