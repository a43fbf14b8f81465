//! LLM client for script generation.
//!
//! Any OpenAI-compatible chat completions endpoint works; the base URL, models
//! and timeout come from [`LlmConfig`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use scriptforge_core::Prompt;

use crate::config::LlmConfig;

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request failed (including timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("provider returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Text returned by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Generated text; may be empty.
    pub content: String,
    /// Model that produced it.
    pub model: String,
}

/// Produces script text from a prompt.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Run one completion. `priority` selects the priority model when one is
    /// configured.
    async fn generate(&self, prompt: &Prompt, priority: bool) -> Result<Completion, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    priority_model: Option<String>,
}

impl OpenAiClient {
    /// Create a client from config and an API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            priority_model: config.priority_model.clone(),
        })
    }

    fn model_for(&self, priority: bool) -> &str {
        match &self.priority_model {
            Some(model) if priority => model,
            _ => &self.model,
        }
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiClient {
    async fn generate(&self, prompt: &Prompt, priority: bool) -> Result<Completion, LlmError> {
        let model = self.model_for(priority);
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.7,
        };

        tracing::debug!(url = %url, model = %model, priority, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorResponse>(&text)
                .map_or_else(|_| format!("HTTP {status}"), |e| e.error.message);
            tracing::error!(status = %status, error = %message, "LLM provider error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prompt() -> Prompt {
        Prompt {
            system: "system".into(),
            user: "write".into(),
        }
    }

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-test".into()),
            base_url,
            model: "standard-model".into(),
            priority_model: Some("fast-model".into()),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({ "model": "standard-model" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "standard-model",
                "choices": [ { "message": { "role": "assistant", "content": "HOOK: ..." } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config(server.uri()), "sk-test").unwrap();
        let completion = client.generate(&prompt(), false).await.unwrap();

        assert_eq!(completion.content, "HOOK: ...");
        assert_eq!(completion.model, "standard-model");
    }

    #[tokio::test]
    async fn priority_uses_priority_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({ "model": "fast-model" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": "done" } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config(server.uri()), "sk-test").unwrap();
        let completion = client.generate(&prompt(), true).await.unwrap();

        assert_eq!(completion.model, "fast-model");
    }

    #[tokio::test]
    async fn provider_errors_carry_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit reached", "type": "requests" }
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config(server.uri()), "sk-test").unwrap();
        let err = client.generate(&prompt(), false).await.unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": null } } ]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config(server.uri()), "sk-test").unwrap();
        let completion = client.generate(&prompt(), false).await.unwrap();

        assert!(completion.content.is_empty());
    }
}
