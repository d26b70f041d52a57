//! In-process feature-hashing embedding model
//!
//! Lowercased alphanumeric tokens are hashed with FNV-1a into a fixed number
//! of buckets and the resulting term-count vector is L2-normalised. Shared
//! vocabulary between two texts therefore shows up as cosine similarity.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::EmbeddingProvider;
use crate::error::{Error, Result};

/// Smallest bucket count that still separates vocabularies usefully
const MIN_DIMENSION: usize = 8;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
struct HashingModel {
    dimension: usize,
    stopwords: HashSet<String>,
}

/// Local embedding model; a failed load is kept and reported on every call
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    model: std::result::Result<HashingModel, String>,
}

impl LocalEmbedder {
    /// Initialise the model once; failures surface as `ModelLoadError` from `embed`
    pub fn load(dimension: usize, stopwords_path: Option<&Path>) -> Self {
        let model = Self::try_load(dimension, stopwords_path);
        match &model {
            Ok(m) => info!(dimension, stopwords = m.stopwords.len(), "Local embedding model loaded"),
            Err(reason) => warn!(reason = %reason, "Local embedding model failed to load"),
        }
        Self { model }
    }

    fn try_load(
        dimension: usize,
        stopwords_path: Option<&Path>,
    ) -> std::result::Result<HashingModel, String> {
        if dimension < MIN_DIMENSION {
            return Err(format!(
                "dimension {} is below the minimum of {}",
                dimension, MIN_DIMENSION
            ));
        }

        let stopwords = match stopwords_path {
            Some(path) => fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?
                .lines()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
            None => HashSet::new(),
        };

        Ok(HashingModel {
            dimension,
            stopwords,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_ok()
    }
}

impl HashingModel {
    fn infer(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !self.stopwords.contains(*t))
        {
            vector[(fnv1a(token) % self.dimension as u64) as usize] += 1.0;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(Error::InferenceError(
                "text contains no indexable tokens".to_string(),
            ));
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut vector {
            *x /= norm;
        }
        Ok(vector)
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match &self.model {
            Ok(model) => model.infer(text),
            Err(reason) => Err(Error::ModelLoadError(reason.clone())),
        }
    }
}
