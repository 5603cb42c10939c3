use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmProvider, ProviderRequest};
use crate::error::ClassifyError;

pub(super) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub(super) const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";
const NAME: &str = "anthropic";

/// Anthropic messages API client.
pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    model: String,
    client: Client,
}

impl AnthropicProvider {
    /// Client for `{base_url}/v1/messages` using `model`.
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
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            model: model.to_string(),
            client,
        })
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, ClassifyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| ClassifyError::InvalidKey { provider: NAME })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: request.prompt,
                }],
            }],
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
        let parsed: AnthropicResponse =
            resp.json().await.map_err(|source| ClassifyError::Transport {
                provider: NAME,
                source,
            })?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.trim().is_empty() {
            return Err(ClassifyError::EmptyReply { provider: NAME });
        }
        Ok(answer)
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
