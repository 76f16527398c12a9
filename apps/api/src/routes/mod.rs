pub mod health;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::chat::handlers as chat;
use crate::documents::handlers as documents;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/upload", post(documents::handle_upload))
        .route("/document", get(documents::handle_current_document))
        .route("/query", post(chat::handle_query))
        .route(
            "/history",
            get(chat::handle_get_history).delete(chat::handle_clear_history),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// CORS for the browser client: a single origin, or anything when `origin` is `*`.
pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if origin.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(origin.trim_end_matches('/'))
        .with_context(|| format!("FRONTEND_ORIGIN '{origin}' is not a valid header value"))?;
    Ok(layer.allow_origin(origin))
}
