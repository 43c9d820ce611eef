//! Generator trait for the external text-completion service

use async_trait::async_trait;

use crate::error::Result;

/// Opaque text completion: prompt in, answer out
///
/// Implementations:
/// - `GeminiClient`: Google Generative Language API
/// - `OllamaGenerator`: local Ollama server
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model being used
    fn model(&self) -> &str;
}
