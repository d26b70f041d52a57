//! Conversation turns handed in by the external conversation store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Label used when a turn is rendered into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

/// One message of a conversation, oldest first in any history slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }
}

/// The last `max_turns` turns, still oldest first
pub fn recent_turns(history: &[ConversationTurn], max_turns: usize) -> &[ConversationTurn] {
    &history[history.len().saturating_sub(max_turns)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_deserialization_without_timestamp() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": "assistant", "content": "Hi"}"#).unwrap();
        assert_eq!(turn.role, TurnRole::Assistant);
        assert_eq!(turn.role.label(), "Assistant");
    }

    #[test]
    fn test_recent_turns() {
        let history: Vec<ConversationTurn> = (0..6)
            .map(|i| ConversationTurn::user(format!("m{}", i)))
            .collect();

        let recent = recent_turns(&history, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "m4");
        assert_eq!(recent[1].content, "m5");

        assert_eq!(recent_turns(&history, 10).len(), 6);
        assert!(recent_turns(&history, 0).is_empty());
    }
}
