//! Axum route handlers for questions and conversation history.

use axum::{extract::State, http::StatusCode, Json};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::chat::query::{answer_question, validate_question, QueryResponse};
use crate::errors::AppError;
use crate::models::chat::ChatTurn;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<ChatTurn>,
}

/// POST /query
///
/// The body is read raw so that a missing `question` and a malformed one
/// produce different messages. Unparsable JSON is treated as an empty body.
pub async fn handle_query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QueryResponse>, AppError> {
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    debug!("Received /query request body: {payload}");

    let document = state
        .session
        .current_document()
        .await
        .ok_or(AppError::NoDocument)?;
    let question = validate_question(&payload)?;

    let response = answer_question(&state, &document, question).await?;
    Ok(Json(response))
}

/// GET /history
pub async fn handle_get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.session.history().await,
    })
}

/// DELETE /history
pub async fn handle_clear_history(State(state): State<AppState>) -> StatusCode {
    let cleared = state.session.clear_history().await;
    info!("Cleared {cleared} messages of chat history");
    StatusCode::NO_CONTENT
}
