use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmProvider, ProviderRequest};
use crate::error::ClassifyError;

pub(super) const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub(super) const DEFAULT_MODEL: &str = "deepseek-chat";
const NAME: &str = "openai";

/// OpenAI compatible chat completions client.
pub struct OpenAiProvider {
    api_key: String,
    endpoint: String,
    model: String,
    client: Client,
}

impl OpenAiProvider {
    /// Client for `{base_url}/chat/completions` using `model`.
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ClassifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClassifyError::Transport {
                provider: NAME,
                source,
            })?;
        Ok(Self {
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            client,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, ClassifyError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| ClassifyError::InvalidKey { provider: NAME })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|source| ClassifyError::Transport {
                provider: NAME,
                source,
            })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ClassifyError::Status {
                provider: NAME,
                status,
                body,
            });
        }
        let parsed: ChatResponse = resp.json().await.map_err(|source| ClassifyError::Transport {
            provider: NAME,
            source,
        })?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ClassifyError::EmptyReply { provider: NAME })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
