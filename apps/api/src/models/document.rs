use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The document queries are answered against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub document_id: Uuid,
    pub file_name: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Extracted text of a single PDF page. `number` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

/// An overlapping window of page text, ready to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub page_number: usize,
    /// Position of the chunk across the whole document.
    pub chunk_index: usize,
    /// First and last line (1-based, inclusive) of the page the chunk covers.
    pub lines: LineRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub from: usize,
    pub to: usize,
}
