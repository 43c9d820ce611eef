//! Retriever: query text → ranked passages

use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::index::SharedIndex;
use crate::types::{SearchHit, TextUnit};

/// Embeds a query and searches the shared index
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: SharedIndex,
    default_k: usize,
}

impl Retriever {
    /// Create a retriever returning `default_k` passages unless told otherwise
    pub fn new(embedder: Arc<dyn Embedder>, index: SharedIndex, default_k: usize) -> Self {
        Self {
            embedder,
            index,
            default_k: default_k.max(1),
        }
    }

    /// Passages returned when no `k` is given
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Up to `k` passages nearest to `query`, best match first
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<TextUnit>> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.unit)
            .collect())
    }

    /// Like `retrieve`, keeping each passage's distance
    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::invalid_argument("query must not be empty"));
        }
        if k == 0 {
            return Err(Error::invalid_argument("k must be positive"));
        }

        let embedding = self.embedder.embed(query).await?;

        let index = self.index.clone();
        let hits = tokio::task::spawn_blocking(move || index.search(&embedding, k))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        tracing::debug!(
            "Retrieved {} passages (k = {}, nearest distance {:?})",
            hits.len(),
            k,
            hits.first().map(|h| h.distance)
        );
        Ok(hits)
    }
}
