//! Ingestion pipeline: extract → embed → insert → persist

use std::sync::Arc;
use std::time::Instant;

use super::extractor::{ensure_pdf, PdfExtractor};
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::index::SharedIndex;
use crate::types::UploadedDocument;

/// Outcome of one ingestion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Passages appended to the index
    pub units_added: usize,
    /// Ordinals assigned to the new passages
    pub ordinals: Vec<u64>,
    /// Index size after the insertion
    pub index_size: usize,
}

/// Turns uploaded documents into indexed passages
#[derive(Clone)]
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    index: SharedIndex,
    batch_size: usize,
}

impl IngestPipeline {
    /// Create a new pipeline
    pub fn new(embedder: Arc<dyn Embedder>, index: SharedIndex, batch_size: usize) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest one uploaded PDF.
    ///
    /// Non-PDF uploads are rejected before any work is done. A document with
    /// no extractable text adds nothing and is not an error.
    pub async fn ingest_document(&self, document: &UploadedDocument) -> Result<IngestReport> {
        ensure_pdf(document.content_type.as_deref())?;
        let start = Instant::now();

        let data = document.data.clone();
        let paragraphs = tokio::task::spawn_blocking(move || PdfExtractor::extract(&data))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        tracing::info!(
            "Extracted {} paragraphs from {} ({} bytes)",
            paragraphs.len(),
            document.display_name(),
            document.data.len()
        );

        let report = self.ingest_texts(paragraphs).await?;

        tracing::info!(
            "Ingested {} in {}ms: {} passages added, index size {}",
            document.display_name(),
            start.elapsed().as_millis(),
            report.units_added,
            report.index_size
        );
        Ok(report)
    }

    /// Embed `texts` and append them to the index as one atomic batch
    pub async fn ingest_texts(&self, texts: Vec<String>) -> Result<IngestReport> {
        if texts.is_empty() {
            return Ok(IngestReport {
                units_added: 0,
                ordinals: Vec::new(),
                index_size: self.index.len(),
            });
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embedder.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.embedder.name(),
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        tracing::debug!("Embedded {} passages with {}", vectors.len(), self.embedder.name());

        // Insert and snapshot hold the write lock; keep them off the runtime threads
        let index = self.index.clone();
        let ordinals = tokio::task::spawn_blocking(move || index.insert(vectors, texts))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        Ok(IngestReport {
            units_added: ordinals.len(),
            ordinals,
            index_size: self.index.len(),
        })
    }

    /// The index this pipeline writes to
    pub fn index(&self) -> &SharedIndex {
        &self.index
    }
}
