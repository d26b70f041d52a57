//! Advisory content moderation
//!
//! Keyword based and deterministic. The filter only annotates a reply; it
//! never rewrites or withholds it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModerationConfig;

/// The single category the keyword filter reports on
pub const INAPPROPRIATE: &str = "inappropriate";

/// Moderation verdict attached to a generation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub flagged: bool,
    pub categories: HashMap<String, bool>,
    pub category_scores: HashMap<String, f32>,
    /// Disallowed terms found in the text, in configured order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
}

impl ModerationResult {
    pub fn score(&self, category: &str) -> Option<f32> {
        self.category_scores.get(category).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ModerationFilter {
    terms: Vec<String>,
    flagged_score: f32,
    clean_score: f32,
}

impl ModerationFilter {
    pub fn new<I, S>(terms: I, flagged_score: f32, clean_score: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            terms,
            flagged_score,
            clean_score,
        }
    }

    pub fn from_config(config: &ModerationConfig) -> Self {
        Self::new(
            &config.disallowed_terms,
            config.flagged_score,
            config.clean_score,
        )
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Scan `text` for disallowed terms (case-insensitive substring match)
    pub fn moderate(&self, text: &str) -> ModerationResult {
        let lowered = text.to_lowercase();
        let matched_terms: Vec<String> = self
            .terms
            .iter()
            .filter(|term| lowered.contains(term.as_str()))
            .cloned()
            .collect();
        let flagged = !matched_terms.is_empty();

        if flagged {
            info!(terms = ?matched_terms, "Content flagged");
        }

        let score = if flagged {
            self.flagged_score
        } else {
            self.clean_score
        };

        ModerationResult {
            flagged,
            categories: HashMap::from([(INAPPROPRIATE.to_string(), flagged)]),
            category_scores: HashMap::from([(INAPPROPRIATE.to_string(), score)]),
            matched_terms,
        }
    }
}

impl Default for ModerationFilter {
    fn default() -> Self {
        Self::from_config(&ModerationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_disallowed_term() {
        let filter = ModerationFilter::new(["hate"], 0.8, 0.1);
        let result = filter.moderate("I hate this");

        assert!(result.flagged);
        assert!(result.score(INAPPROPRIATE).unwrap() >= 0.8);
        assert_eq!(result.categories.get(INAPPROPRIATE), Some(&true));
        assert_eq!(result.matched_terms, vec!["hate"]);
    }

    #[test]
    fn test_clean_text_gets_low_score() {
        let result = ModerationFilter::default().moderate("How do I reset my password?");

        assert!(!result.flagged);
        assert_eq!(result.score(INAPPROPRIATE), Some(0.1));
        assert_eq!(result.categories.get(INAPPROPRIATE), Some(&false));
        assert!(result.matched_terms.is_empty());
    }

    #[test]
    fn test_case_insensitive_and_multiple_terms() {
        let filter = ModerationFilter::new(["Violence", " abuse "], 0.9, 0.0);
        let result = filter.moderate("No ABUSE or violence here");

        assert!(result.flagged);
        assert_eq!(result.matched_terms, vec!["violence", "abuse"]);
        assert_eq!(result.score(INAPPROPRIATE), Some(0.9));
    }

    #[test]
    fn test_deterministic_and_pure() {
        let filter = ModerationFilter::default();
        let text = "harassment is not tolerated";
        assert_eq!(filter.moderate(text), filter.moderate(text));
    }

    #[test]
    fn test_empty_term_list_never_flags() {
        let filter = ModerationFilter::new(Vec::<String>::new(), 0.8, 0.1);
        assert!(!filter.moderate("anything at all").flagged);
        assert!(filter.terms().is_empty());
    }
}
