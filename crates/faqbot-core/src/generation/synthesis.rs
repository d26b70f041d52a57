//! Deterministic reply synthesis
//!
//! Used when the strategy chain is empty or exhausted. Always returns
//! non-empty text.

use crate::retrieval::SimilarityResult;

/// `provider_used` recorded for synthesized replies
pub const SYNTHESIS_PROVIDER: &str = "deterministic";

const GREETING_REPLY: &str = "Hello! How can I help you today?";
const THANKS_REPLY: &str = "You're welcome! Is there anything else I can help you with?";
const HELP_REPLY: &str = "I'm here to help! What would you like to know?";
const CLARIFY_REPLY: &str = "I understand your question. Let me help you find the information you need. Could you please provide more details?";

const GENERIC_FOLLOW_UPS: [&str; 3] = [
    "Can you tell me more about that?",
    "What are the next steps?",
    "Is there anything else I should know?",
];

const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Thanks,
    Help,
}

impl Intent {
    fn reply(self) -> &'static str {
        match self {
            Intent::Greeting => GREETING_REPLY,
            Intent::Thanks => THANKS_REPLY,
            Intent::Help => HELP_REPLY,
        }
    }
}

/// Keyword intent of a message, matched on whole words
pub fn detect_intent(message: &str) -> Option<Intent> {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| matches!(*w, "hello" | "hi" | "hey")) {
        Some(Intent::Greeting)
    } else if words.iter().any(|w| w.starts_with("thank")) {
        Some(Intent::Thanks)
    } else if words.iter().any(|w| matches!(*w, "help" | "helping")) {
        Some(Intent::Help)
    } else {
        None
    }
}

/// Reply built from intent keywords, then the best entry above
/// `min_similarity`, then a clarification prompt
pub fn synthesize(message: &str, relevant: &[SimilarityResult], min_similarity: f32) -> String {
    if let Some(intent) = detect_intent(message) {
        return intent.reply().to_string();
    }

    match relevant.first() {
        Some(best) if best.score >= min_similarity && !best.entry.answer.trim().is_empty() => {
            format!(
                "Based on your question, here's what I found: {}",
                best.entry.answer
            )
        }
        _ => CLARIFY_REPLY.to_string(),
    }
}

/// Up to three follow-ups: questions of the other relevant entries, then
/// generic prompts
pub fn suggest_questions(relevant: &[SimilarityResult], min_similarity: f32) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);

    let specific = relevant
        .iter()
        .skip(1)
        .filter(|r| r.score >= min_similarity)
        .map(|r| r.entry.question.trim().to_string());
    let generic = GENERIC_FOLLOW_UPS.iter().map(|q| q.to_string());

    for question in specific.chain(generic) {
        if suggestions.len() == MAX_SUGGESTIONS {
            break;
        }
        if !question.is_empty() && !suggestions.contains(&question) {
            suggestions.push(question);
        }
    }
    suggestions
}
