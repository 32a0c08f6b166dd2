//! Chat-completion client used by the extraction gateway.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::Config;

const USER_AGENT: &str = "material-companion-api/1.0";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("{0}")]
    Request(String),
    #[error("OpenAI API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("Invalid response from OpenAI")]
    InvalidResponse,
}

// ── Trait ────────────────────────────────────────────────────────────────────

/// Turns a prompt into the model's textual answer.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ── OpenAI client ────────────────────────────────────────────────────────────

/// OpenAI chat-completions client. Sampling is pinned to temperature 0.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, CompletionError> {
        let http = reqwest::ClientBuilder::new()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let endpoint = format!(
            "{}/chat/completions",
            config.openai_base_url.as_str().trim_end_matches('/')
        );

        Ok(Self {
            http,
            endpoint,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        tracing::info!(model = %self.model, prompt_len = prompt.len(), "calling OpenAI API");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Request(format!("TimeoutError: {}", e))
                } else if e.is_connect() {
                    CompletionError::Request(format!("ConnectError: {}", e))
                } else {
                    CompletionError::Request(format!("RequestError: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            return Err(CompletionError::Api { status, message });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| CompletionError::InvalidResponse)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::InvalidResponse)
    }
}

// ── Test double ──────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    enum Behavior {
        Reply(String),
        Fail,
        Panic,
    }

    /// Records every prompt and answers with a fixed behavior.
    pub struct MockCompletion {
        behavior: Behavior,
        calls: Mutex<Vec<String>>,
    }

    impl MockCompletion {
        fn with(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(text: impl Into<String>) -> Self {
            Self::with(Behavior::Reply(text.into()))
        }

        pub fn failing() -> Self {
            Self::with(Behavior::Fail)
        }

        pub fn panicking() -> Self {
            Self::with(Behavior::Panic)
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.calls.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl CompletionClient for MockCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            match &self.behavior {
                Behavior::Reply(text) => Ok(text.clone()),
                Behavior::Fail => Err(CompletionError::InvalidResponse),
                Behavior::Panic => panic!("mock completion exploded"),
            }
        }
    }
}
