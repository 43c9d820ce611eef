//! Document ingestion: PDF extraction, embedding and index insertion

mod extractor;
mod pipeline;

pub use extractor::{ensure_pdf, paragraphs_from_pages, split_paragraphs, PdfExtractor};
pub use pipeline::{IngestPipeline, IngestReport};
