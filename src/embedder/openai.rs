//! OpenAI-compatible embeddings client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{normalize_embedding, Embedder, EmbeddingVector, RawEmbedding};
use crate::error::{ConfigError, EmbeddingError};

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Wire encoding requested from the embeddings endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// JSON number arrays.
    #[default]
    Float,
    /// Base64 packed little-endian `f32` buffers.
    Base64,
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => f.write_str("float"),
            Self::Base64 => f.write_str("base64"),
        }
    }
}

/// Async embeddings client that issues one request per text.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    encoding: EncodingFormat,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimensions: Option<usize>,
        encoding: EncodingFormat,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ConfigError::Missing("embedding model"));
        }
        let base = Url::parse(base_url).map_err(|err| ConfigError::InvalidUrl {
            name: "OpenAI base URL",
            reason: err.to_string(),
        })?;
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| ConfigError::Client {
                service: "OpenAI",
                reason: "API key is not a valid header value".into(),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ConfigError::Client {
                service: "OpenAI",
                reason: err.to_string(),
            })?;
        let endpoint = format!("{}/embeddings", base.as_str().trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model,
            dimensions,
            encoding,
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            encoding_format: self.encoding,
            dimensions: self.dimensions,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| EmbeddingError::Transport(err.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| EmbeddingError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|err| EmbeddingError::Malformed(err.to_string()))?;
        let entry = parsed
            .data
            .into_iter()
            .min_by_key(|entry| entry.index)
            .ok_or_else(|| EmbeddingError::Malformed("response contained no embeddings".into()))?;
        let vector = normalize_embedding(entry.embedding)?;
        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(EmbeddingError::Malformed(format!(
                    "requested {expected} dimensions, received {}",
                    vector.len()
                )));
            }
        }
        debug!(model = %self.model, dims = vector.len(), "embedded text");
        Ok(vector)
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: EncodingFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: RawEmbedding,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Transient;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer, encoding: EncodingFormat) -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            "sk-test",
            &server.uri(),
            DEFAULT_MODEL,
            None,
            encoding,
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn returns_float_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "input": "hello",
                "encoding_format": "float"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{ "object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3] }],
                "model": DEFAULT_MODEL
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = embedder(&server, EncodingFormat::Float)
            .embed("hello")
            .await
            .unwrap();
        assert_eq!(vector, vec![0.1_f32, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn decodes_base64_embedding() {
        let server = MockServer::start().await;
        let packed: Vec<u8> = [1.5_f32, -2.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "encoding_format": "base64" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": STANDARD.encode(packed) }]
            })))
            .mount(&server)
            .await;

        let vector = embedder(&server, EncodingFormat::Base64)
            .embed("hello")
            .await
            .unwrap();
        assert_eq!(vector, vec![1.5, -2.0]);
    }

    #[tokio::test]
    async fn empty_text_never_reaches_the_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = embedder(&server, EncodingFormat::Float)
            .embed("   ")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
    }

    #[tokio::test]
    async fn auth_failure_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided." }
            })))
            .mount(&server)
            .await;

        let err = embedder(&server, EncodingFormat::Float)
            .embed("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Api { status: 401, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn empty_data_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = embedder(&server, EncodingFormat::Float)
            .embed("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Malformed(_)));
    }

    #[tokio::test]
    async fn dimension_override_is_sent_and_checked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "dimensions": 4 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [0.1, 0.2] }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiEmbedder::new(
            "sk-test",
            &server.uri(),
            DEFAULT_MODEL,
            Some(4),
            EncodingFormat::Float,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.dimensions(), Some(4));
        assert!(matches!(
            client.embed("hello").await,
            Err(EmbeddingError::Malformed(_))
        ));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let result = OpenAiEmbedder::new(
            "  ",
            "https://api.openai.com/v1",
            DEFAULT_MODEL,
            None,
            EncodingFormat::Float,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let result = OpenAiEmbedder::new(
            "sk-test",
            "not a url",
            DEFAULT_MODEL,
            None,
            EncodingFormat::Float,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }
}
