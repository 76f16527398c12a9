use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::{ChatModel, Embedder};
use crate::session::Session;
use crate::vector_store::VectorIndex;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Gemini embeddings in production.
    pub embedder: Arc<dyn Embedder>,
    /// Gemini chat in production.
    pub chat: Arc<dyn ChatModel>,
    /// Pinecone in production.
    pub index: Arc<dyn VectorIndex>,
    pub session: Arc<Session>,
}
