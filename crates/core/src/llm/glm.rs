// crates/core/src/llm/glm.rs
//! GLM chat-completions client.
//!
//! POSTs `{model, messages}` with bearer auth and reads
//! `choices[0].message.content` plus usage token counts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::LlmProvider;
use super::types::{CompletionRequest, CompletionResponse, LlmError};

const GLM_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const GLM_MODEL: &str = "glm-4.5-air";

/// Completions take a while on long prompts; well past typical generation
/// latency but finite.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum error-body bytes echoed into error messages.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: i32,
    #[serde(default)]
    completion_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
}

pub struct GlmClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GLM_API_URL)
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: GLM_MODEL.to_string(),
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl LlmProvider for GlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let body = WireRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".into()))?;

        Ok(CompletionResponse {
            text: choice.message.content,
            model: if wire.model.is_empty() {
                self.model.clone()
            } else {
                wire.model
            },
            prompt_tokens: wire.usage.prompt_tokens,
            completion_tokens: wire.usage.completion_tokens,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "be brief".into(),
            user: "hello".into(),
        }
    }

    #[tokio::test]
    async fn test_complete_parses_content_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                r###"{
                    "id": "cmpl-1",
                    "model": "glm-4.5-air",
                    "choices": [{"message": {"role": "assistant", "content": "## PROJECT_OVERVIEW\nhi"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160}
                }"###,
            )
            .create_async()
            .await;

        let client = GlmClient::with_base_url("test-key", server.url());
        let response = client.complete(request()).await.unwrap();

        assert!(response.text.starts_with("## PROJECT_OVERVIEW"));
        assert_eq!(response.model, "glm-4.5-air");
        assert_eq!(response.prompt_tokens, 120);
        assert_eq!(response.completion_tokens, 40);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_surfaces_api_error_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(401)
            .with_body("{\"error\": \"bad key\"}")
            .create_async()
            .await;

        let client = GlmClient::with_base_url("wrong", server.url());
        let err = client.complete(request()).await.unwrap_err();
        match err {
            LlmError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"model": "glm-4.5-air", "choices": []}"#)
            .create_async()
            .await;

        let client = GlmClient::with_base_url("key", server.url());
        assert!(matches!(
            client.complete(request()).await,
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GlmClient::new("");
        assert!(matches!(
            client.complete(request()).await,
            Err(LlmError::NotConfigured)
        ));
    }
}
