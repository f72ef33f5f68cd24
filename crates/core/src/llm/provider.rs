// crates/core/src/llm/provider.rs
//! LlmProvider trait defining the interface for LLM integrations.

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for chat-completion providers.
///
/// The deep-dive generator is written against this seam so tests can swap
/// in a scripted provider instead of a network call.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a completion with a system + user message pair.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier for logging and persistence (e.g. "glm-4.5-air").
    fn model(&self) -> &str;
}
