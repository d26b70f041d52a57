//! Model server integration - OpenAI-compatible HTTP API
//!
//! This module provides:
//! - HTTP client for chat completions and embeddings
//! - Request/response types matching the OpenAI-compatible API
//! - Status-code mapping onto the provider error taxonomy

mod client;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use types::{
    ChatRequest, ChatResponse, Choice, EmbeddingRequest, EmbeddingResponse, LlmResponse, Message,
    MessageRole, TokenCounts, Usage,
};
