// Upload side: PDF extraction, chunking and indexing of the current resume.

pub mod chunking;
pub mod handlers;
pub mod ingest;
pub mod pdf;
