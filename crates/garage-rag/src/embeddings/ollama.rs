//! Ollama embedding provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ensure_dimensions, ensure_embeddable, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server (`POST /api/embeddings`)
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::external("ollama", format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::from_response("ollama", response).await);
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        ensure_dimensions(&body.embedding, self.dimensions)?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_embeddable(text)?;
        retry_with_backoff("Ollama embedding", self.max_retries, move || {
            self.request_embedding(text)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
