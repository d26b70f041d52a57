//! Keyword search over a knowledge snapshot
//!
//! Covers entries that semantic ranking cannot see (no vectors yet) and
//! serves as the lookup path when no embedding is wanted at all.

use super::{KnowledgeEntry, KnowledgeSnapshot};

/// Case-insensitive substring match of `query` against entry questions
///
/// Results come back in `id` order, capped at `limit`.
pub fn keyword_search<'a>(
    snapshot: &'a KnowledgeSnapshot,
    query: &str,
    language: &str,
    category_id: Option<u64>,
    limit: usize,
) -> Vec<&'a KnowledgeEntry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut matches: Vec<&KnowledgeEntry> = snapshot
        .eligible(language, category_id)
        .filter(|e| e.question.to_lowercase().contains(&needle))
        .collect();

    matches.sort_by_key(|e| e.id);
    matches.truncate(limit);
    matches
}
