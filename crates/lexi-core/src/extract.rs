//! Plain-text extraction from uploaded documents.
//!
//! Two formats are recognised by filename suffix: `.txt` (UTF-8) and `.pdf`
//! (text concatenated page by page). Extraction is a pure function of the
//! payload; [`extract_text_blocking`] moves it onto the blocking pool for
//! async callers because PDF parsing is CPU bound.

use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::ExtractError;

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
}

impl DocumentFormat {
    /// Detect the format from a declared filename (case-insensitive suffix).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".txt") {
            Some(Self::PlainText)
        } else if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

/// Extract plain text from `bytes`, using `filename` to pick the format.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let format = DocumentFormat::from_filename(filename).ok_or(ExtractError::UnsupportedFormat)?;

    let text = match format {
        DocumentFormat::PlainText => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| ExtractError::DecodeError { detail: e.to_string() })?,
        DocumentFormat::Pdf => join_pages(pdf_pages(bytes)?),
    };

    if text.trim().is_empty() {
        return Err(ExtractError::NoTextFound);
    }
    debug!(filename, chars = text.chars().count(), "extracted document text");
    Ok(text)
}

/// Run [`extract_text`] on the blocking thread pool.
///
/// A worker that dies or is cancelled yields [`ExtractError::Interrupted`],
/// which is a fault of ours rather than of the document.
pub async fn extract_text_blocking(bytes: Bytes, filename: String) -> Result<String, ExtractError> {
    flatten_join(tokio::task::spawn_blocking(move || extract_text(&bytes, &filename)).await)
}

fn flatten_join(
    joined: Result<Result<String, ExtractError>, tokio::task::JoinError>,
) -> Result<String, ExtractError> {
    joined.unwrap_or_else(|e| {
        warn!(error = %e, "extraction worker did not complete");
        Err(ExtractError::Interrupted { detail: e.to_string() })
    })
}

/// Concatenate per-page text in page order. Each page that yields text is
/// followed by a newline; blank pages contribute nothing.
pub fn join_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = String>,
{
    pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .fold(String::new(), |mut acc, page| {
            acc.push_str(&page);
            acc.push('\n');
            acc
        })
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match outcome {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => {
            warn!(error = ?e, "pdf text extraction failed");
            Err(ExtractError::DecodeError { detail: format!("{e:?}") })
        }
        Err(_) => {
            warn!("pdf text extraction panicked");
            Err(ExtractError::DecodeError { detail: "pdf parser panicked".to_owned() })
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_text_round_trips_exactly() {
        let content = "Clause 1.\n  The tenant shall pay rent – ₹10,000.\n";
        let text = extract_text(content.as_bytes(), "lease.txt").unwrap();
        assert_eq!(text, content);
    }

    #[test]
    fn suffix_match_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_filename("LEASE.TXT"), Some(DocumentFormat::PlainText));
        assert_eq!(DocumentFormat::from_filename("deed.Pdf"), Some(DocumentFormat::Pdf));
    }

    #[test]
    fn unknown_suffix_is_unsupported() {
        let err = extract_text(b"hello", "contract.docx").unwrap_err();
        assert_eq!(err, ExtractError::UnsupportedFormat);
        assert_eq!(err.to_string(), "Unsupported file type.");
    }

    #[test]
    fn empty_filename_is_unsupported() {
        assert_eq!(extract_text(b"hello", "").unwrap_err(), ExtractError::UnsupportedFormat);
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], "bad.txt").unwrap_err();
        assert!(matches!(err, ExtractError::DecodeError { .. }));
    }

    #[test]
    fn whitespace_only_text_is_no_text_found() {
        assert_eq!(extract_text(b" \n\t ", "blank.txt").unwrap_err(), ExtractError::NoTextFound);
    }

    #[test]
    fn garbage_pdf_is_a_decode_error() {
        let err = extract_text(b"definitely not a pdf", "scan.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::DecodeError { .. }));
    }

    #[test]
    fn pages_join_in_order_and_skip_empty_ones() {
        let pages = vec!["first".to_owned(), String::new(), "third".to_owned()];
        assert_eq!(join_pages(pages), "first\nthird\n");
    }

    #[test]
    fn whitespace_only_pages_are_skipped() {
        let pages = vec!["first".to_owned(), "\n".to_owned(), " \n\t".to_owned(), "third".to_owned()];
        assert_eq!(join_pages(pages), "first\nthird\n");
    }

    fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
        use printpdf::{BuiltinFont, Mm, PdfDocument};

        let (doc, page, layer) = PdfDocument::new("extract test", Mm(210.0), Mm(297.0), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).unwrap();
        let mut current = doc.get_page(page).get_layer(layer);
        for (i, text) in pages.iter().enumerate() {
            if i > 0 {
                let (page, layer) = doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
                current = doc.get_page(page).get_layer(layer);
            }
            if let Some(text) = text {
                current.use_text(*text, 12.0, Mm(20.0), Mm(270.0), &font);
            }
        }
        doc.save_to_bytes().unwrap()
    }

    #[test]
    fn pdf_pages_are_extracted_and_blank_pages_add_nothing() {
        let with_blank = pdf_with_pages(&[Some("Rent is due monthly"), None, Some("Notice period applies")]);
        let without_blank = pdf_with_pages(&[Some("Rent is due monthly"), Some("Notice period applies")]);

        let text = extract_text(&with_blank, "lease.pdf").unwrap();
        let first = text.find("Rent is due monthly").expect("first page text");
        let third = text.find("Notice period applies").expect("third page text");
        assert!(first < third);
        assert_eq!(text, extract_text(&without_blank, "lease.pdf").unwrap());
    }

    #[tokio::test]
    async fn dead_extraction_worker_is_interrupted_not_a_decode_error() {
        let joined = tokio::task::spawn_blocking(|| -> Result<String, ExtractError> { panic!("worker died") }).await;
        let err = flatten_join(joined).unwrap_err();
        assert!(matches!(err, ExtractError::Interrupted { .. }));
    }

    #[tokio::test]
    async fn blocking_wrapper_matches_pure_function() {
        let text = extract_text_blocking(Bytes::from_static(b"notice"), "n.txt".into())
            .await
            .unwrap();
        assert_eq!(text, "notice");
    }
}
