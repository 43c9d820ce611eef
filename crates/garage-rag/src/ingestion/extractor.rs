//! PDF text extraction into paragraph-sized text units

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// MIME type accepted for ingestion
pub const PDF_MIME: &str = "application/pdf";

/// Two or more consecutive newlines separate paragraphs
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("paragraph break pattern is valid"));

/// Check that an upload is declared as `application/pdf`.
///
/// Only the declared content type counts; filenames are not trusted.
pub fn ensure_pdf(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(declared) => {
            let mime = declared.split(';').next().unwrap_or("").trim();
            if mime.eq_ignore_ascii_case(PDF_MIME) {
                Ok(())
            } else {
                Err(Error::UnsupportedFormat(format!(
                    "only {} is accepted, got '{}'",
                    PDF_MIME, declared
                )))
            }
        }
        None => Err(Error::UnsupportedFormat(format!(
            "missing content type, only {} is accepted",
            PDF_MIME
        ))),
    }
}

/// PDF extractor: page text via pdf-extract, lopdf as fallback
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extract ordered paragraphs from raw PDF bytes.
    ///
    /// Pages are visited in order and each page is split into blank-line
    /// separated blocks; blocks are trimmed and empty ones dropped.
    pub fn extract(data: &[u8]) -> Result<Vec<String>> {
        let pages = Self::extract_pages(data)?;
        let paragraphs = paragraphs_from_pages(&pages);
        tracing::debug!(
            "Extracted {} paragraphs from {} pages",
            paragraphs.len(),
            pages.len()
        );
        Ok(paragraphs)
    }

    /// Plain text of every page, in page order
    pub fn extract_pages(data: &[u8]) -> Result<Vec<String>> {
        if data.is_empty() {
            return Err(Error::document_parse("document is empty"));
        }

        // pdf-extract panics on some malformed inputs instead of erroring
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data)) {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => {
                tracing::warn!("pdf-extract failed: {}, trying fallback", e);
                Self::extract_pages_fallback(data)
            }
            Err(_) => {
                tracing::warn!("pdf-extract panicked, trying fallback");
                Self::extract_pages_fallback(data)
            }
        }
    }

    /// Per-page text extraction using lopdf directly
    fn extract_pages_fallback(data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::document_parse(format!("Failed to load PDF: {}", e)))?;

        let pages = doc
            .get_pages()
            .keys()
            .map(|&page_number| match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("No text extracted from page {}: {}", page_number, e);
                    String::new()
                }
            })
            .collect();

        Ok(pages)
    }
}

/// Paragraphs of every page, page order first, then order within the page
pub fn paragraphs_from_pages(pages: &[String]) -> Vec<String> {
    pages.iter().flat_map(|page| split_paragraphs(page)).collect()
}

/// Split one page of text at blank lines into trimmed, non-empty blocks
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    PARAGRAPH_BREAK
        .split(&normalized)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

/// Unify line endings, drop trailing spaces on each line and replace a few
/// characters PDF text layers commonly emit
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}
