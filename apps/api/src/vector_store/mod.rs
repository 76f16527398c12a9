//! Vector index abstraction. `PineconeIndex` is the production backend;
//! `AppState` holds an `Arc<dyn VectorIndex>` so handlers can be tested offline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub mod pinecone;

pub use pinecone::{PineconeError, PineconeIndex};

/// Flat metadata stored alongside every chunk vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub text: String,
    pub document_id: Uuid,
    pub file_name: String,
    pub page_number: usize,
    pub chunk_index: usize,
    pub loc_lines_from: usize,
    pub loc_lines_to: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl QueryMatch {
    /// The chunk text stored in metadata, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get("text")?
            .as_str()
            .filter(|t| !t.is_empty())
    }
}

/// Restricts a query to chunks of a single uploaded document.
pub fn document_filter(document_id: Uuid) -> Value {
    json!({ "document_id": { "$eq": document_id.to_string() } })
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Stores records, returning how many the index acknowledged.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, PineconeError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, PineconeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_text_reads_metadata() {
        let m: QueryMatch = serde_json::from_value(json!({
            "id": "a",
            "score": 0.82,
            "metadata": { "text": "Led migration to Kubernetes", "page_number": 1.0 }
        }))
        .unwrap();
        assert_eq!(m.text(), Some("Led migration to Kubernetes"));
    }

    #[test]
    fn test_match_without_metadata_has_no_text() {
        let m: QueryMatch = serde_json::from_value(json!({ "id": "b", "score": 0.1 })).unwrap();
        assert_eq!(m.text(), None);

        let m: QueryMatch =
            serde_json::from_value(json!({ "id": "c", "metadata": { "text": "" } })).unwrap();
        assert_eq!(m.text(), None);
    }

    #[test]
    fn test_document_filter_shape() {
        let id = Uuid::nil();
        assert_eq!(
            document_filter(id),
            json!({ "document_id": { "$eq": "00000000-0000-0000-0000-000000000000" } })
        );
    }
}
