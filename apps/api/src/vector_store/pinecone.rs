use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{QueryMatch, VectorIndex, VectorRecord};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Pinecone accepts at most 100 vectors per upsert request when metadata is attached.
const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum PineconeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Index '{0}' has no host")]
    MissingHost(String),
}

#[derive(Debug, Clone)]
pub struct PineconeSettings {
    pub api_key: String,
    pub index_name: String,
    pub index_host: Option<String>,
    pub namespace: Option<String>,
    pub upsert_concurrency: usize,
}

/// Data-plane client for a single serverless Pinecone index.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    base_url: String,
    namespace: Option<String>,
    upsert_concurrency: usize,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: Option<String>,
}

impl PineconeIndex {
    /// Connects to the index, resolving its host through the control plane
    /// when no host is configured.
    pub async fn connect(settings: PineconeSettings) -> Result<Self, PineconeError> {
        Self::connect_via(settings, CONTROL_PLANE_URL).await
    }

    async fn connect_via(
        settings: PineconeSettings,
        control_plane_url: &str,
    ) -> Result<Self, PineconeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let host = match settings.index_host {
            Some(host) => host,
            None => {
                describe_index_host(
                    &client,
                    control_plane_url,
                    &settings.api_key,
                    &settings.index_name,
                )
                .await?
            }
        };
        info!("Using Pinecone index '{}' at {}", settings.index_name, host);

        Ok(Self {
            client,
            api_key: settings.api_key,
            base_url: normalize_host(&host),
            namespace: settings.namespace,
            upsert_concurrency: settings.upsert_concurrency.max(1),
        })
    }

    async fn upsert_batch(&self, batch: &[VectorRecord]) -> Result<usize, PineconeError> {
        let response = self
            .client
            .post(format!("{}/vectors/upsert", self.base_url))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&UpsertRequest {
                vectors: batch,
                namespace: self.namespace.as_deref(),
            })
            .send()
            .await?;

        let response: UpsertResponse = check_status(response).await?.json().await?;
        debug!("Upserted batch of {} vectors", response.upserted_count);
        Ok(response.upserted_count)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, PineconeError> {
        let counts: Vec<usize> = stream::iter(into_batches(records, UPSERT_BATCH_SIZE))
            .map(|batch| async move { self.upsert_batch(&batch).await })
            .buffer_unordered(self.upsert_concurrency)
            .try_collect()
            .await?;
        Ok(counts.into_iter().sum())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, PineconeError> {
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&QueryRequest {
                vector,
                top_k,
                include_metadata: true,
                include_values: false,
                filter,
                namespace: self.namespace.as_deref(),
            })
            .send()
            .await?;

        let response: QueryResponse = check_status(response).await?.json().await?;
        Ok(response.matches)
    }
}

/// Splits records into owned batches of at most `size`, preserving order.
fn into_batches<T>(mut records: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    while !records.is_empty() {
        let rest = records.split_off(size.min(records.len()));
        batches.push(records);
        records = rest;
    }
    batches
}

async fn describe_index_host(
    client: &Client,
    control_plane_url: &str,
    api_key: &str,
    index_name: &str,
) -> Result<String, PineconeError> {
    let response = client
        .get(format!(
            "{}/indexes/{index_name}",
            control_plane_url.trim_end_matches('/')
        ))
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
        .send()
        .await?;

    let described: DescribeIndexResponse = check_status(response).await?.json().await?;
    described
        .host
        .filter(|h| !h.is_empty())
        .ok_or_else(|| PineconeError::MissingHost(index_name.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PineconeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PineconeError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Index hosts are reported without a scheme; accept either form.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
