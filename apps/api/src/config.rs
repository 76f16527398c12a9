use std::str::FromStr;

use anyhow::{bail, Context, Result};

pub const DEFAULT_FRONTEND_ORIGIN: &str = "https://resume-analyzer-frontend-1iwb.onrender.com";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub pinecone_api_key: String,
    pub pinecone_index_name: String,
    /// Data-plane host. Resolved through the Pinecone control plane when unset.
    pub pinecone_index_host: Option<String>,
    pub pinecone_namespace: Option<String>,
    /// Single allowed CORS origin; `*` allows any.
    pub frontend_origin: String,
    pub port: u16,
    pub rust_log: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub upsert_concurrency: usize,
    /// Max retained chat history messages. `None` keeps everything.
    pub history_limit: Option<usize>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            pinecone_api_key: require_env("PINECONE_API_KEY")?,
            pinecone_index_name: require_env("PINECONE_INDEX_NAME")?,
            pinecone_index_host: optional_env("PINECONE_INDEX_HOST"),
            pinecone_namespace: optional_env("PINECONE_NAMESPACE"),
            frontend_origin: optional_env("FRONTEND_ORIGIN")
                .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGIN.to_string()),
            port: parse_env("PORT", 5000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            chunk_size: parse_env("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", 200)?,
            top_k: parse_env("TOP_K", 10)?,
            upsert_concurrency: parse_env("UPSERT_CONCURRENCY", 5)?,
            history_limit: optional_env("HISTORY_LIMIT")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("HISTORY_LIMIT must be a non-negative integer")?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("CHUNK_SIZE must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            bail!("TOP_K must be greater than zero");
        }
        if self.upsert_concurrency == 0 {
            bail!("UPSERT_CONCURRENCY must be greater than zero");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        gemini_api_key: "test-gemini-key".to_string(),
        pinecone_api_key: "test-pinecone-key".to_string(),
        pinecone_index_name: "resumes".to_string(),
        pinecone_index_host: Some("resumes-test.svc.pinecone.io".to_string()),
        pinecone_namespace: None,
        frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
        port: 5000,
        rust_log: "info".to_string(),
        chunk_size: 1000,
        chunk_overlap: 200,
        top_k: 10,
        upsert_concurrency: 5,
        history_limit: None,
        max_upload_bytes: 10 * 1024 * 1024,
    }
}
