//! Application state for the garage-rag server

use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::embeddings::{self, Embedder};
use crate::error::{Error, Result};
use crate::generation::{self, ContextBuilder, Generator};
use crate::index::{IndexStore, SharedIndex};
use crate::ingestion::IngestPipeline;
use crate::query::QueryEngine;
use crate::retrieval::Retriever;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Index handle shared with the pipeline and retriever
    index: SharedIndex,
    /// Embedder used for passages and queries
    embedder: Arc<dyn Embedder>,
    /// Ingest, retrieve, generate
    engine: QueryEngine,
}

impl AppState {
    /// Create new application state: restore the index and build the
    /// configured embedder and generator
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing garage-rag application state...");

        let store = IndexStore::from_config(&config.index);
        let index = tokio::task::spawn_blocking(move || SharedIndex::open(store))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;
        tracing::info!(
            "Index ready at {} ({} passages)",
            index.store().path().display(),
            index.len()
        );

        let embedder = embeddings::from_config(&config.embeddings).await?;
        let generator = generation::from_config(&config.llm)?;

        Self::from_parts(config, index, embedder, generator)
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: RagConfig,
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        if let Some(stored) = index.dimensions() {
            if stored != embedder.dimensions() {
                return Err(Error::DimensionMismatch {
                    operation: "startup",
                    expected: stored,
                    actual: embedder.dimensions(),
                });
            }
        }

        let pipeline = IngestPipeline::new(
            embedder.clone(),
            index.clone(),
            config.embeddings.batch_size,
        );
        let retriever = Retriever::new(embedder.clone(), index.clone(), config.retrieval.top_k);
        let engine = QueryEngine::new(
            pipeline,
            retriever,
            ContextBuilder::new(config.retrieval.max_context_chars),
            generator,
            Duration::from_secs(config.llm.timeout_secs),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                index,
                embedder,
                engine,
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the index handle
    pub fn index(&self) -> &SharedIndex {
        &self.inner.index
    }

    /// Get the embedder
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.inner.embedder
    }

    /// Get the ingestion pipeline
    pub fn pipeline(&self) -> &IngestPipeline {
        self.inner.engine.pipeline()
    }

    /// Get the query engine
    pub fn engine(&self) -> &QueryEngine {
        &self.inner.engine
    }

    /// Get the generator
    pub fn generator(&self) -> &Arc<dyn Generator> {
        self.inner.engine.generator()
    }
}
