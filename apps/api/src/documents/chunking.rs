use anyhow::{Context, Result};
use text_splitter::{ChunkConfig, TextSplitter};

use crate::models::document::{Chunk, LineRange, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Splits every page into overlapping windows, preferring paragraph, then
/// sentence, then word boundaries. Chunk indices run across the whole document.
pub fn split_pages(pages: &[Page], settings: ChunkSettings) -> Result<Vec<Chunk>> {
    let config = ChunkConfig::new(settings.chunk_size)
        .with_overlap(settings.chunk_overlap)
        .context("chunk overlap must be smaller than chunk size")?;
    let splitter = TextSplitter::new(config);

    let mut chunks = Vec::new();
    for page in pages {
        for (offset, text) in splitter.chunk_indices(&page.text) {
            if text.trim().is_empty() {
                continue;
            }
            chunks.push(Chunk {
                text: text.to_string(),
                page_number: page.number,
                chunk_index: chunks.len(),
                lines: line_range(&page.text, offset, text),
            });
        }
    }
    Ok(chunks)
}

fn line_range(page: &str, offset: usize, chunk: &str) -> LineRange {
    let from = page[..offset].matches('\n').count() + 1;
    let to = from + chunk.matches('\n').count();
    LineRange { from, to }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: usize, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_short_page_is_single_chunk() {
        let pages = vec![page(1, "Jane Doe\nStaff Engineer\nRust, Go")];
        let chunks = split_pages(&pages, ChunkSettings::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Jane Doe\nStaff Engineer\nRust, Go");
        assert_eq!(chunks[0].lines, LineRange { from: 1, to: 3 });
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = (0..200)
            .map(|i| format!("word{i:03}"))
            .collect::<Vec<_>>()
            .join(" ");
        let settings = ChunkSettings {
            chunk_size: 100,
            chunk_overlap: 30,
        };
        let chunks = split_pages(&[page(1, &text)], settings).unwrap();

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
        // Overlapping windows repeat text, so together they exceed the page.
        let total: usize = chunks.iter().map(|c| c.text.len()).sum();
        assert!(total > text.len());
    }

    #[test]
    fn test_chunk_indices_span_pages() {
        let pages = vec![page(1, "Experience"), page(3, "Education")];
        let chunks = split_pages(&pages, ChunkSettings::default()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].page_number, 3);
    }

    #[test]
    fn test_line_range_counts_preceding_lines() {
        let text = "a\nb\nc\nd";
        assert_eq!(line_range(text, 4, "c\nd"), LineRange { from: 3, to: 4 });
    }

    #[test]
    fn test_invalid_overlap_is_error() {
        let settings = ChunkSettings {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(split_pages(&[page(1, "text")], settings).is_err());
    }
}
