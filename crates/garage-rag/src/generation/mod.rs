//! Answer generation: prompt assembly and LLM clients

pub mod context;
mod gemini;
mod llm;
mod ollama;

pub use context::{AugmentedPrompt, ContextBuilder};
pub use gemini::GeminiClient;
pub use llm::Generator;
pub use ollama::OllamaGenerator;

use std::sync::Arc;

use crate::config::{GeneratorProvider, LlmConfig};
use crate::error::Result;

/// Build the configured generator
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider {
        GeneratorProvider::Gemini => Arc::new(GeminiClient::new(config)?),
        GeneratorProvider::Ollama => Arc::new(OllamaGenerator::new(config)?),
    };
    tracing::info!(
        "Generator initialized: {} ({})",
        generator.name(),
        generator.model()
    );
    Ok(generator)
}
