//! Cosine similarity ranking with deterministic tie-breaking

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::knowledge::KnowledgeEntry;

/// Cosine similarity in `[-1, 1]`
///
/// Returns exactly `0.0` when either vector has zero norm, when lengths
/// differ, or when the inputs are not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f64, 0.0f64, 0.0f64), |(d, aa, bb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (d + x * y, aa + x * x, bb + y * y)
        });

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }

    let sim = dot / (na.sqrt() * nb.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// A ranked knowledge entry; vectors are not carried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub entry_id: u64,
    pub score: f32,
    pub entry: KnowledgeEntry,
}

/// Ranks candidates against a query vector of the process-wide dimension
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker {
    dimension: usize,
}

impl SimilarityRanker {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// A stored vector counts only if it has exactly `dimension` components
    fn valid<'a>(&self, vector: Option<&'a Vec<f32>>) -> Option<&'a [f32]> {
        vector
            .filter(|v| v.len() == self.dimension)
            .map(Vec::as_slice)
    }

    /// Best score of the query against an entry's question and answer vectors
    ///
    /// `None` when the entry has no usable vector.
    pub fn score(&self, query: &[f32], entry: &KnowledgeEntry) -> Option<f32> {
        [
            self.valid(entry.question_vector.as_ref()),
            self.valid(entry.answer_vector.as_ref()),
        ]
        .into_iter()
        .flatten()
        .map(|v| cosine_similarity(query, v))
        .reduce(f32::max)
    }

    /// Top `k` entries by score descending, ties broken by `entry_id` ascending
    pub fn rank<'a>(
        &self,
        query: &[f32],
        candidates: impl IntoIterator<Item = &'a KnowledgeEntry>,
        k: usize,
    ) -> Vec<SimilarityResult> {
        if k == 0 {
            return Vec::new();
        }
        if query.len() != self.dimension {
            debug!(
                expected = self.dimension,
                actual = query.len(),
                "Query vector has wrong dimension, nothing to rank"
            );
            return Vec::new();
        }

        let mut scored: Vec<(&KnowledgeEntry, f32)> = candidates
            .into_iter()
            .filter_map(|entry| self.score(query, entry).map(|score| (entry, score)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(entry, score)| SimilarityResult {
                entry_id: entry.id,
                score,
                entry: KnowledgeEntry {
                    question_vector: None,
                    answer_vector: None,
                    ..entry.clone()
                },
            })
            .collect()
    }
}
