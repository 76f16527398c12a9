//! Upload pipeline: PDF → pages → chunks → embeddings → vector index.
//!
//! The session's current document is only replaced once every step has
//! succeeded, so a failed upload leaves the previous resume queryable.

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::documents::chunking::{split_pages, ChunkSettings};
use crate::documents::pdf::extract_pages;
use crate::errors::AppError;
use crate::models::document::{Chunk, DocumentInfo, Page};
use crate::state::AppState;
use crate::vector_store::{ChunkMetadata, VectorRecord};

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Resume uploaded and processed successfully";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub document: DocumentInfo,
}

pub async fn ingest_pdf(
    state: &AppState,
    file_name: &str,
    bytes: Bytes,
) -> Result<UploadResponse, AppError> {
    let pages = extract_pages(bytes).await?;
    ingest_pages(state, file_name, &pages).await
}

/// Chunks, embeds and indexes already-extracted pages, then makes the
/// result the current document.
pub async fn ingest_pages(
    state: &AppState,
    file_name: &str,
    pages: &[Page],
) -> Result<UploadResponse, AppError> {
    let settings = ChunkSettings {
        chunk_size: state.config.chunk_size,
        chunk_overlap: state.config.chunk_overlap,
    };
    let chunks = split_pages(pages, settings)?;
    if chunks.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "The PDF contains no extractable text".to_string(),
        ));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = state
        .embedder
        .embed_documents(&texts)
        .await
        .map_err(|e| AppError::Embedding(e.to_string()))?;
    if vectors.len() != chunks.len() {
        return Err(AppError::Embedding(format!(
            "expected {} vectors, received {}",
            chunks.len(),
            vectors.len()
        )));
    }

    let document_id = Uuid::new_v4();
    let records = build_records(document_id, file_name, chunks, vectors);
    let chunk_count = records.len();
    let upserted = state.index.upsert(records).await?;

    let document = DocumentInfo {
        document_id,
        file_name: file_name.to_string(),
        page_count: pages.len(),
        chunk_count,
        uploaded_at: Utc::now(),
    };
    if let Some(previous) = state.session.set_document(document.clone()).await {
        info!(
            "Replaced document {} ({}) as current",
            previous.document_id, previous.file_name
        );
    }

    info!(
        "Ingested '{}' as {document_id}: {} pages, {chunk_count} chunks, {upserted} vectors upserted",
        file_name,
        pages.len()
    );

    Ok(UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        document,
    })
}

fn build_records(
    document_id: Uuid,
    file_name: &str,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
) -> Vec<VectorRecord> {
    chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: Uuid::new_v4().to_string(),
            values,
            metadata: ChunkMetadata {
                text: chunk.text,
                document_id,
                file_name: file_name.to_string(),
                page_number: chunk.page_number,
                chunk_index: chunk.chunk_index,
                loc_lines_from: chunk.lines.from,
                loc_lines_to: chunk.lines.to,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{test_state, FakeChat, FakeEmbedder, FakeIndex};

    fn pages() -> Vec<Page> {
        vec![
            Page {
                number: 1,
                text: "Jane Doe\nStaff Engineer at Acme".to_string(),
            },
            Page {
                number: 2,
                text: "Education\nBSc Computer Science".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_ingest_upserts_every_chunk_and_sets_document() {
        let index = FakeIndex::default();
        let state = test_state(FakeEmbedder::default(), index.clone(), FakeChat::default());

        let response = ingest_pages(&state, "jane.pdf", &pages()).await.unwrap();

        assert_eq!(response.message, UPLOAD_SUCCESS_MESSAGE);
        assert_eq!(response.document.page_count, 2);
        assert_eq!(response.document.chunk_count, 2);

        let stored = index.records();
        assert_eq!(stored.len(), 2);
        assert!(stored
            .iter()
            .all(|r| r.metadata.document_id == response.document.document_id));
        assert_eq!(stored[1].metadata.page_number, 2);
        assert_eq!(stored[1].metadata.file_name, "jane.pdf");

        assert_eq!(
            state.session.current_document().await,
            Some(response.document)
        );
    }

    #[tokio::test]
    async fn test_failed_embedding_keeps_previous_document() {
        let state = test_state(
            FakeEmbedder::default(),
            FakeIndex::default(),
            FakeChat::default(),
        );
        let first = ingest_pages(&state, "first.pdf", &pages()).await.unwrap();

        let failing = test_state(
            FakeEmbedder::failing(),
            FakeIndex::default(),
            FakeChat::default(),
        );
        let failing = AppState {
            session: state.session.clone(),
            ..failing
        };
        let err = ingest_pages(&failing, "second.pdf", &pages())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Embedding(_)));
        assert_eq!(
            state.session.current_document().await,
            Some(first.document)
        );
    }

    #[tokio::test]
    async fn test_blank_pages_are_unprocessable() {
        let state = test_state(
            FakeEmbedder::default(),
            FakeIndex::default(),
            FakeChat::default(),
        );
        let blank = vec![Page {
            number: 1,
            text: "   ".to_string(),
        }];
        let err = ingest_pages(&state, "blank.pdf", &blank).await.unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }
}
