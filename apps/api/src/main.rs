mod chat;
mod config;
mod documents;
mod errors;
mod llm_client;
mod models;
mod routes;
mod session;
mod state;
mod vector_store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::routes::{build_router, cors_layer};
use crate::session::Session;
use crate::state::AppState;
use crate::vector_store::pinecone::PineconeSettings;
use crate::vector_store::PineconeIndex;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={level},tower_http={level}",
                env!("CARGO_CRATE_NAME"),
                level = &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Analyzer API v{}", env!("CARGO_PKG_VERSION"));

    // Gemini serves both embeddings and chat
    let gemini = Arc::new(GeminiClient::new(config.gemini_api_key.clone())?);
    info!(
        "Gemini client initialized (embeddings: {}, chat: {})",
        llm_client::EMBEDDING_MODEL,
        llm_client::CHAT_MODEL
    );

    let index = PineconeIndex::connect(PineconeSettings {
        api_key: config.pinecone_api_key.clone(),
        index_name: config.pinecone_index_name.clone(),
        index_host: config.pinecone_index_host.clone(),
        namespace: config.pinecone_namespace.clone(),
        upsert_concurrency: config.upsert_concurrency,
    })
    .await?;

    let cors = cors_layer(&config.frontend_origin)?;
    info!("CORS allowed origin: {}", config.frontend_origin);

    let state = AppState {
        embedder: gemini.clone(),
        chat: gemini,
        index: Arc::new(index),
        session: Arc::new(Session::new(config.history_limit)),
        config: config.clone(),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
