//! Ollama generation client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::llm::Generator;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate` client with automatic retry
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaGenerator {
    /// Create a new Ollama generator
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn request_answer(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::external("ollama", format!("generation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::from_response("ollama", response).await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::external_permanent("ollama", format!("unreadable response: {}", e)))?;

        Ok(body.response)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with Ollama model {}", self.model);
        retry_with_backoff("Ollama generation", self.max_retries, move || {
            self.request_answer(prompt)
        })
        .await
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

    fn model(&self) -> &str {
        &self.model
    }
}
