//! Response bodies for the HTTP surface

use serde::{Deserialize, Serialize};

/// POST /upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub units_added: usize,
    pub index_size: usize,
}

/// POST /generate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated answer; absent when generation failed. The field keeps the
    /// name existing clients read.
    pub gemini_response: Option<String>,
    /// Retrieved passages, best match first
    pub relevant_docs: Vec<String>,
    /// Passages added by a document sent with the question
    pub units_added: usize,
    /// Whether passages were dropped to fit the context budget
    pub context_truncated: bool,
    /// Generation failure, reported alongside the retrieval results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
}

/// GET /api/info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub version: String,
    pub index_size: usize,
    pub dimensions: Option<usize>,
    pub embedder: String,
    pub generator: String,
    pub generator_model: String,
    pub default_top_k: usize,
}
