// crates/core/src/llm/types.rs
//! Request/response/error types for LLM integration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A two-message completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

/// Completion output plus usage accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM credential not configured")]
    NotConfigured,

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_serialize() {
        let req = CompletionRequest {
            system: "You are a mentor".into(),
            user: "Explain issue #12".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("mentor"));
        assert!(json.contains("#12"));
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Api {
            status: 429,
            body: "too many requests".into(),
        };
        assert_eq!(err.to_string(), "LLM API error (429): too many requests");
        assert_eq!(
            LlmError::NotConfigured.to_string(),
            "LLM credential not configured"
        );
    }
}
