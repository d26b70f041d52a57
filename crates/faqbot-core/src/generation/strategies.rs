//! Model-backed generation strategies

use async_trait::async_trait;
use tracing::debug;

use super::{GenerationStrategy, StrategyReply};
use crate::context::Context;
use crate::conversation::TurnRole;
use crate::error::{Error, Result};
use crate::llm::{LlmClient, Message, TokenCounts};

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Provide concise and helpful responses.";

/// Chat-style strategy against a hosted model
///
/// History turns become role-tagged messages and the knowledge block is
/// sent as a second system message.
#[derive(Debug, Clone)]
pub struct HostedStrategy {
    client: LlmClient,
}

impl HostedStrategy {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub fn messages(context: &Context) -> Vec<Message> {
        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        if let Some(block) = context.knowledge_block() {
            messages.push(Message::system(block));
        }
        messages.extend(context.turns().iter().map(|turn| match turn.role {
            TurnRole::User => Message::user(&turn.content),
            TurnRole::Assistant => Message::assistant(&turn.content),
        }));
        messages.push(Message::user(context.message()));
        messages
    }
}

#[async_trait]
impl GenerationStrategy for HostedStrategy {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn produce(&self, context: &Context) -> Result<StrategyReply> {
        let response = self.client.complete(Self::messages(context)).await?;
        reply_from(self.name(), response.content, response.usage)
    }
}

/// Completion-style strategy against a model server on the loopback interface
#[derive(Debug, Clone)]
pub struct LocalStrategy {
    client: LlmClient,
}

impl LocalStrategy {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GenerationStrategy for LocalStrategy {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn produce(&self, context: &Context) -> Result<StrategyReply> {
        let prompt = context.render();
        let response = self.client.complete(vec![Message::user(&prompt)]).await?;

        // Some servers echo the prompt before the completion
        let text = response
            .content
            .strip_prefix(prompt.as_str())
            .unwrap_or(response.content.as_str())
            .to_string();
        reply_from(self.name(), text, response.usage)
    }
}

fn reply_from(provider: &str, text: String, usage: Option<TokenCounts>) -> Result<StrategyReply> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::EmptyResponse(provider.to_string()));
    }
    debug!(provider, chars = text.len(), "Strategy produced reply");

    let reply = StrategyReply::new(text);
    Ok(match usage {
        Some(usage) => reply.with_usage(usage),
        None => reply,
    })
}
