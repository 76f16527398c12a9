/// LLM Client — the single point of entry for all Google Generative Language API calls.
///
/// No other module may call the Gemini API directly. Handlers depend on the
/// `Embedder` and `ChatModel` traits, implemented here by `GeminiClient`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::chat::{ChatTurn, TextPart};

pub mod prompts;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Embedding model used for both document chunks and questions.
pub const EMBEDDING_MODEL: &str = "text-embedding-004";
/// Chat model used to answer questions.
pub const CHAT_MODEL: &str = "gemini-2.0-flash";
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on `requests` per batchEmbedContents call.
const EMBED_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gemini returned empty content")]
    EmptyContent,

    #[error("Embedding count mismatch: sent {expected} texts, received {received} vectors")]
    EmbeddingCount { expected: usize, received: usize },
}

/// Turns text into vectors for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GeminiError>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GeminiError>;
}

/// Produces an answer from a system instruction and the conversation so far.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        contents: &[ChatTurn],
    ) -> Result<String, GeminiError>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [PartRef<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PartRef<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: &'a [ChatTurn],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    error: GeminiApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiApiErrorBody {
    message: String,
}

/// Wraps the Gemini REST API with retry logic.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_base_delay: Duration,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GeminiError> {
        Self::with_base_url(api_key, GEMINI_API_URL)
    }

    /// Targets another endpoint, e.g. a regional proxy or a local mock.
    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self, GeminiError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(120)).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    #[cfg(test)]
    fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// POSTs a JSON body and decodes the JSON response.
    /// Retries on 429 (rate limit), 5xx and transport errors with exponential backoff.
    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, GeminiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await
            {
                Err(e) => GeminiError::Http(e),
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let error = GeminiError::Api {
                        status: status.as_u16(),
                        message: api_error_message(body),
                    };
                    if !is_retryable(status) {
                        return Err(error);
                    }
                    warn!("Gemini API returned {status}: {error}");
                    error
                }
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(error);
            }

            let delay = backoff_delay(self.retry_base_delay, attempt);
            warn!(
                "Gemini call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn embed_request<'a>(&self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: format!("models/{EMBEDDING_MODEL}"),
            content: Content {
                parts: [PartRef { text }],
            },
            task_type,
        }
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GeminiError> {
        let url = self.model_url(EMBEDDING_MODEL, "embedContent");
        let request = self.embed_request(text, TaskType::RetrievalQuery);
        let response: EmbedContentResponse = self.post_json(&url, &request).await?;

        if response.embedding.values.is_empty() {
            return Err(GeminiError::EmptyContent);
        }
        Ok(response.embedding.values)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GeminiError> {
        let url = self.model_url(EMBEDDING_MODEL, "batchEmbedContents");
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|t| self.embed_request(t, TaskType::RetrievalDocument))
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post_json(&url, &request).await?;

            if response.embeddings.len() != batch.len() {
                return Err(GeminiError::EmbeddingCount {
                    expected: batch.len(),
                    received: response.embeddings.len(),
                });
            }
            if response.embeddings.iter().any(|e| e.values.is_empty()) {
                return Err(GeminiError::EmptyContent);
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        debug!("Embedded {} document chunks", vectors.len());
        Ok(vectors)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        contents: &[ChatTurn],
    ) -> Result<String, GeminiError> {
        let url = self.model_url(CHAT_MODEL, "generateContent");
        let request = GenerateContentRequest {
            system_instruction: Content {
                parts: [PartRef {
                    text: system_instruction,
                }],
            },
            contents,
        };
        let response: GenerateContentResponse = self.post_json(&url, &request).await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, candidate_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        response.text().ok_or_else(|| {
            let reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            warn!("Gemini returned no text (finish_reason: {reason})");
            GeminiError::EmptyContent
        })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << (attempt.saturating_sub(1)))
}

/// Pulls `error.message` out of a Gemini error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<GeminiApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
