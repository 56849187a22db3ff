//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::QuestionModel;
use crate::error::{ConfigError, GenerationError};

/// Base URL of the hosted API.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Upper bound on generated tokens per request.
pub const DEFAULT_MAX_TOKENS: usize = 1500;

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicModel {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicModel {
    /// Builds a client for `{base_url}/messages`; a blank key is a [`ConfigError`].
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        max_tokens: usize,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("ANTHROPIC_API_KEY"));
        }
        let base = Url::parse(base_url).map_err(|err| ConfigError::InvalidUrl {
            name: "Anthropic base URL",
            reason: err.to_string(),
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim()).map_err(|_| ConfigError::Client {
                service: "Anthropic",
                reason: "API key is not a valid header value".into(),
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ConfigError::Client {
                service: "Anthropic",
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/messages", base.as_str().trim_end_matches('/')),
            model: model.into(),
            max_tokens: max_tokens.max(1),
        })
    }
}

#[async_trait]
impl QuestionModel for AnthropicModel {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![ContentBlock {
                    kind: "text",
                    text: prompt,
                }],
            }],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|err| GenerationError::Malformed(err.to_string()))?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        debug!(model = %self.model, chars = answer.len(), "completion received");
        Ok(answer)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
