//! Axum route handlers for resume uploads.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::documents::ingest::{ingest_pdf, UploadResponse};
use crate::errors::AppError;
use crate::models::document::DocumentInfo;
use crate::state::AppState;

/// Multipart field the client sends the PDF under.
pub const UPLOAD_FIELD: &str = "resume";

#[derive(Debug, Serialize)]
pub struct CurrentDocumentResponse {
    pub document: Option<DocumentInfo>,
}

/// POST /upload
///
/// Accepts a multipart form with the PDF in the `resume` field and makes it
/// the document all subsequent questions are answered against.
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        AppError::Validation(format!("Expected a multipart form upload: {}", e.body_text()))
    })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("resume.pdf")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        info!("Received upload '{}' ({} bytes)", file_name, bytes.len());
        let response = ingest_pdf(&state, &file_name, bytes).await?;
        return Ok(Json(response));
    }

    Err(AppError::Validation(format!(
        "No file uploaded under field '{UPLOAD_FIELD}'"
    )))
}

/// GET /document
pub async fn handle_current_document(
    State(state): State<AppState>,
) -> Json<CurrentDocumentResponse> {
    Json(CurrentDocumentResponse {
        document: state.session.current_document().await,
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}
