//! Question answering: embed the question, retrieve the closest chunks of the
//! current document, and ask the chat model with the running history.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{resume_analyst_system, CONTEXT_SEPARATOR, NOT_FOUND_ANSWER};
use crate::models::document::DocumentInfo;
use crate::state::AppState;
use crate::vector_store::{document_filter, QueryMatch};

pub const MISSING_QUESTION_MESSAGE: &str = "Missing 'question' in request body. Example: { \"question\": \"What is the candidate's experience?\" }";
pub const INVALID_QUESTION_MESSAGE: &str = "'question' must be a non-empty string";

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

/// Pulls a usable question out of a request body.
///
/// Absent or falsy values (`null`, `false`, `0`, `""`) count as missing;
/// anything else that is not a non-blank string is invalid.
pub fn validate_question(body: &Value) -> Result<&str, AppError> {
    let question = match body.get("question") {
        Some(q) if !is_falsy(q) => q,
        _ => return Err(AppError::Validation(MISSING_QUESTION_MESSAGE.to_string())),
    };
    match question.as_str() {
        Some(q) if !q.trim().is_empty() => Ok(q),
        _ => Err(AppError::Validation(INVALID_QUESTION_MESSAGE.to_string())),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

pub async fn answer_question(
    state: &AppState,
    document: &DocumentInfo,
    question: &str,
) -> Result<QueryResponse, AppError> {
    let vector = state
        .embedder
        .embed_query(question)
        .await
        .map_err(|e| AppError::Embedding(e.to_string()))?;
    if vector.is_empty() {
        return Err(AppError::Embedding(
            "embedding model returned an empty vector".to_string(),
        ));
    }

    let matches = state
        .index
        .query(
            &vector,
            state.config.top_k,
            Some(document_filter(document.document_id)),
        )
        .await?;
    if matches.is_empty() {
        warn!(
            "No matches found for document {} ({})",
            document.document_id, document.file_name
        );
    }

    let context = build_context(&matches);
    if context.trim().is_empty() {
        return Ok(QueryResponse {
            answer: NOT_FOUND_ANSWER.to_string(),
        });
    }

    let contents = state.session.history_with(question).await;
    let answer = state
        .chat
        .generate(&resume_analyst_system(&context), &contents)
        .await?;

    state.session.record_exchange(question, &answer).await;
    info!(
        "Answered question against {} using {} chunks",
        document.document_id,
        matches.len()
    );

    Ok(QueryResponse { answer })
}

/// Joins the text of every match that carries any, in ranking order.
fn build_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .filter_map(QueryMatch::text)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
