//! Configuration for the garage-rag service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "GARAGE_RAG_CONFIG";
/// Environment variable overriding `llm.api_key`
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable overriding `index.storage_path`
pub const INDEX_PATH_ENV: &str = "GARAGE_RAG_INDEX_PATH";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Generation (LLM) configuration
    pub llm: LlmConfig,
    /// Index persistence configuration
    pub index: IndexConfig,
    /// Retrieval and prompt assembly configuration
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration from `path`, or from `$GARAGE_RAG_CONFIG`, falling
    /// back to defaults when neither is set. Environment overrides are applied
    /// last and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections take their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `GEMINI_API_KEY` and `GARAGE_RAG_INDEX_PATH`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(path) = std::env::var_os(INDEX_PATH_ENV) {
            self.index.storage_path = PathBuf::from(path);
        }
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be positive".into()));
        }
        if self.embeddings.provider == EmbeddingProvider::Onnx && self.embeddings.max_length == 0 {
            return Err(Error::Config("embeddings.max_length must be positive".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".into()));
        }
        if self.llm.provider == GeneratorProvider::Gemini
            && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "llm.api_key (or ${}) is required for the gemini provider",
                API_KEY_ENV
            )));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Which embedder computes passage and query vectors
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// In-process sentence-transformers model run with ONNX Runtime
    #[default]
    Onnx,
    /// Ollama `/api/embeddings`
    Ollama,
    /// Feature-hashing embedder for tests and model-less setups
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub provider: EmbeddingProvider,
    /// Model name; defaults per provider when unset
    pub model: Option<String>,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Number of texts embedded per request batch
    pub batch_size: usize,
    /// Maximum tokens per text (ONNX)
    pub max_length: usize,
    /// Where the ONNX model and tokenizer are cached
    pub cache_dir: PathBuf,
    /// Ollama base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Onnx,
            model: None,
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: data_dir().join("models"),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Which service generates answers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    /// Google Generative Language API
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generation backend
    pub provider: GeneratorProvider,
    /// Gemini API base URL
    pub gemini_base_url: String,
    /// Ollama base URL
    pub ollama_base_url: String,
    /// Generation model name; defaults per provider when unset
    pub generate_model: Option<String>,
    /// API key (Gemini)
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Upper bound on one generation call, in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::Gemini,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            generate_model: None,
            api_key: None,
            temperature: 0.3,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Default sentence-transformers model (ONNX)
    pub const DEFAULT_ONNX_MODEL: &'static str = "all-MiniLM-L6-v2";
    /// Default Ollama embedding model
    pub const DEFAULT_OLLAMA_MODEL: &'static str = "all-minilm";

    /// Model used for embeddings
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, EmbeddingProvider::Onnx) => Self::DEFAULT_ONNX_MODEL,
            (None, EmbeddingProvider::Ollama) => Self::DEFAULT_OLLAMA_MODEL,
            (None, EmbeddingProvider::Hashing) => "feature-hashing",
        }
    }

    /// Cache directory for the configured ONNX model
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.model())
    }
}

impl LlmConfig {
    /// Default Gemini model
    pub const DEFAULT_GEMINI_MODEL: &'static str = "gemini-1.5-flash-latest";
    /// Default Ollama model
    pub const DEFAULT_OLLAMA_MODEL: &'static str = "llama3.2:3b";

    /// Model used for generation
    pub fn model(&self) -> &str {
        match (&self.generate_model, self.provider) {
            (Some(model), _) => model,
            (None, GeneratorProvider::Gemini) => Self::DEFAULT_GEMINI_MODEL,
            (None, GeneratorProvider::Ollama) => Self::DEFAULT_OLLAMA_MODEL,
        }
    }
}

/// What to do when the snapshot on disk cannot be read at startup
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Refuse to start
    #[default]
    Fail,
    /// Move the corrupt snapshot aside and start with an empty index
    StartEmpty,
}

/// Index persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot file
    pub storage_path: PathBuf,
    /// Corrupt snapshot handling
    pub recovery: RecoveryPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            storage_path: data_dir().join("index.bin"),
            recovery: RecoveryPolicy::Fail,
        }
    }
}

/// Per-user data directory for the index and cached models
fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("garage-rag")
}

/// Retrieval and prompt assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages retrieved per question
    pub top_k: usize,
    /// Character budget for the context block (0 = unlimited)
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 100,
            max_context_chars: 12_000,
        }
    }
}
