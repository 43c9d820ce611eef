//! Question answering: optional ingest, retrieve, assemble, generate

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::generation::{ContextBuilder, Generator};
use crate::ingestion::IngestPipeline;
use crate::retrieval::Retriever;
use crate::types::{TextUnit, UploadedDocument};

/// Result of one question.
///
/// Retrieval results are kept even when generation fails; exactly one of
/// `answer` and `generation_error` is set.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: Option<String>,
    pub generation_error: Option<String>,
    /// Retrieved passages, best match first
    pub passages: Vec<TextUnit>,
    /// Passages added by the document sent with the question
    pub units_added: usize,
    pub context_truncated: bool,
}

/// Runs the query path end to end
#[derive(Clone)]
pub struct QueryEngine {
    pipeline: IngestPipeline,
    retriever: Retriever,
    context: ContextBuilder,
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl QueryEngine {
    /// Create a new engine; `timeout` bounds each generation call
    pub fn new(
        pipeline: IngestPipeline,
        retriever: Retriever,
        context: ContextBuilder,
        generator: Arc<dyn Generator>,
        timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            retriever,
            context,
            generator,
            timeout,
        }
    }

    /// Answer `prompt`, ingesting `document` first when one is attached.
    ///
    /// `k` overrides the configured number of retrieved passages.
    pub async fn ask(
        &self,
        prompt: &str,
        document: Option<&UploadedDocument>,
        k: Option<usize>,
    ) -> Result<QueryOutcome> {
        if prompt.trim().is_empty() {
            return Err(Error::invalid_argument("prompt must not be empty"));
        }
        let start = Instant::now();

        let units_added = match document {
            Some(document) => self.pipeline.ingest_document(document).await?.units_added,
            None => 0,
        };

        let k = k.unwrap_or_else(|| self.retriever.default_k());
        let passages = self.retriever.retrieve(prompt, k).await?;
        let augmented = self.context.build(prompt, &passages);

        let (answer, generation_error) = match self.generate(&augmented.prompt).await {
            Ok(answer) => (Some(answer), None),
            Err(e) => {
                tracing::warn!("Generation failed, returning retrieval results only: {}", e);
                (None, Some(e.to_string()))
            }
        };

        tracing::info!(
            "Answered in {}ms: {} passages retrieved, {} in context, generated: {}",
            start.elapsed().as_millis(),
            passages.len(),
            augmented.passages_used,
            answer.is_some()
        );

        Ok(QueryOutcome {
            answer,
            generation_error,
            passages,
            units_added,
            context_truncated: augmented.truncated,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.generator.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(Error::external(
                self.generator.name(),
                format!("no answer within {}s", self.timeout.as_secs()),
            )),
        }
    }

    /// Retriever used for the query path
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Pipeline used for attached documents
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Generator used for answers
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }
}
