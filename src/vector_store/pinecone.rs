//! Pinecone data-plane client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{IndexRecord, QueryMatch, VectorIndex, MAX_UPSERT_BATCH};
use crate::error::{ConfigError, IndexError};

/// Default control-plane endpoint used to look up index hosts.
pub const DEFAULT_CONTROL_PLANE: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2024-07";

/// Client bound to one Pinecone index (and optionally one namespace).
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    base_url: String,
    namespace: Option<String>,
}

fn build_client(api_key: &str, timeout: Duration) -> Result<Client, ConfigError> {
    if api_key.trim().is_empty() {
        return Err(ConfigError::Missing("PINECONE_API_KEY"));
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        "Api-Key",
        HeaderValue::from_str(api_key.trim()).map_err(|_| ConfigError::Client {
            service: "Pinecone",
            reason: "API key is not a valid header value".into(),
        })?,
    );
    headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|err| ConfigError::Client {
            service: "Pinecone",
            reason: err.to_string(),
        })
}

/// Accepts a bare host (as the control plane reports it) or a full URL.
fn normalize_host(name: &'static str, host: &str) -> Result<String, ConfigError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    let candidate = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    let url = Url::parse(&candidate).map_err(|err| ConfigError::InvalidUrl {
        name,
        reason: err.to_string(),
    })?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, IndexError> {
    let resp = request
        .send()
        .await
        .map_err(|err| IndexError::Transport(err.to_string()))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| IndexError::Transport(err.to_string()))?;
    if !status.is_success() {
        return Err(IndexError::Api {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|err| IndexError::Malformed(err.to_string()))
}

impl PineconeIndex {
    /// Connects to an index whose data-plane host is already known.
    pub fn new(
        api_key: &str,
        host: &str,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = build_client(api_key, timeout)?;
        let base_url = normalize_host("PINECONE_INDEX_HOST", host)?;
        Ok(Self {
            client,
            base_url,
            namespace: namespace.filter(|ns| !ns.trim().is_empty()),
        })
    }

    /// Looks up an index host by name through the control plane, then connects to it.
    pub async fn connect(
        api_key: &str,
        control_plane: &str,
        index_name: &str,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if index_name.trim().is_empty() {
            return Err(ConfigError::Missing("PINECONE_INDEX"));
        }
        let client = build_client(api_key, timeout)?;
        let control_plane = normalize_host("Pinecone control plane", control_plane)?;
        let description: IndexDescription = send_json(
            client.get(format!("{control_plane}/indexes/{}", index_name.trim())),
        )
        .await?;
        debug!(index = index_name, host = %description.host, "resolved index host");
        Self::new(api_key, &description.host, namespace, timeout)
    }

    /// Data-plane base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }
        if records.len() > MAX_UPSERT_BATCH {
            return Err(IndexError::BatchTooLarge {
                len: records.len(),
                max: MAX_UPSERT_BATCH,
            });
        }
        let request = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };
        let response: UpsertResponse = send_json(
            self.client
                .post(format!("{}/vectors/upsert", self.base_url))
                .json(&request),
        )
        .await?;
        if let Some(count) = response.upserted_count {
            if count != records.len() {
                return Err(IndexError::Malformed(format!(
                    "store acknowledged {count} of {} records",
                    records.len()
                )));
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = send_json(
            self.client
                .post(format!("{}/query", self.base_url))
                .json(&request),
        )
        .await?;
        debug!(matches = response.matches.len(), top_k, "queried index");
        Ok(response.matches)
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}
