// crates/core/src/llm/mod.rs
//! LLM integration: the provider trait and the GLM chat-completions client.

mod glm;
mod provider;
mod types;

pub use glm::GlmClient;
pub use provider::LlmProvider;
pub use types::{CompletionRequest, CompletionResponse, LlmError};
