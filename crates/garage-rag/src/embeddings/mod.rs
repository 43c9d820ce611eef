//! Text embedding providers
//!
//! The embedder is chosen once at startup and never swapped: vectors from a
//! different model live in an incompatible space, and only the dimension
//! check in the index would notice.

mod hashing;
mod ollama;
mod onnx;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use onnx::OnnxEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OnnxEmbedder`: in-process sentence-transformers model (default)
/// - `OllamaEmbedder`: local Ollama server (MiniLM-class models)
/// - `HashingEmbedder`: deterministic feature hashing for tests
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Reject text that must never reach a model
pub fn ensure_embeddable(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::embedding("refusing to embed empty text"));
    }
    Ok(())
}

/// Check a model response against the configured dimension
pub fn ensure_dimensions(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::embedding(format!(
            "model returned {} dimensions, expected {}",
            vector.len(),
            expected
        )));
    }
    Ok(())
}

/// Build the configured embedder
pub async fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Onnx => Arc::new(OnnxEmbedder::new(config).await?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimensions)),
    };
    tracing::info!(
        "Embedder initialized: {} ({} dimensions)",
        embedder.name(),
        embedder.dimensions()
    );
    Ok(embedder)
}
