//! PDF text extraction. `pdf-extract` is CPU-bound and may panic on malformed
//! input, so it always runs inside `spawn_blocking`.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::document::Page;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// pdf-extract separates pages with a form feed.
const PAGE_BREAK: char = '\u{c}';

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Extracts non-blank pages of text from an in-memory PDF.
pub async fn extract_pages(bytes: Bytes) -> Result<Vec<Page>, AppError> {
    if !looks_like_pdf(&bytes) {
        return Err(AppError::UnprocessableEntity(
            "Uploaded file is not a PDF".to_string(),
        ));
    }

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| {
            warn!("PDF extraction task failed: {e}");
            AppError::UnprocessableEntity("Could not read the PDF".to_string())
        })?
        .map_err(|e| {
            warn!("PDF extraction error: {e}");
            AppError::UnprocessableEntity("Could not read the PDF".to_string())
        })?;

    let pages = split_into_pages(&text);
    if pages.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "The PDF contains no extractable text".to_string(),
        ));
    }

    debug!("Extracted {} pages ({} chars)", pages.len(), text.len());
    Ok(pages)
}

/// Splits extracted text at page breaks, numbering pages from 1 and
/// dropping the ones with no visible text.
pub fn split_into_pages(text: &str) -> Vec<Page> {
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Page {
            number: i + 1,
            text: page.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_pages_numbers_from_one() {
        let pages = split_into_pages("Jane Doe\nEngineer\u{c}Education\nMIT");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].text, "Education\nMIT");
    }

    #[test]
    fn test_blank_pages_are_dropped_but_numbering_kept() {
        let pages = split_into_pages("Summary\u{c}  \n \u{c}Skills");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].number, 3);
    }

    #[test]
    fn test_text_without_page_breaks_is_one_page() {
        let pages = split_into_pages("only page");
        assert_eq!(pages, vec![Page { number: 1, text: "only page".to_string() }]);
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.7\n%\xe2\xe3"));
        assert!(!looks_like_pdf(b"\r\n%PDF-1.4"));
        assert!(!looks_like_pdf(b"%PDF"));
        assert!(!looks_like_pdf(b"PK\x03\x04 docx archive"));
        assert!(!looks_like_pdf(b""));
    }

    #[tokio::test]
    async fn test_extract_rejects_non_pdf() {
        let err = extract_pages(Bytes::from_static(b"plain text resume"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }
}
