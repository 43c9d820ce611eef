//! Passages, index entries and search hits

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A trimmed, non-empty passage extracted from a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    /// Position assigned at insertion; increases monotonically over the
    /// lifetime of the index and is never reused
    pub ordinal: u64,
    /// Passage text
    pub content: String,
}

/// One stored passage together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub unit: TextUnit,
    pub vector: Vec<f32>,
}

/// A passage returned by a nearest-neighbor search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub unit: TextUnit,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Raw upload handed to the ingestion pipeline
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedDocument {
    /// Create an upload declared as `application/pdf`
    pub fn pdf(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: Some("application/pdf".to_string()),
            data: data.into(),
        }
    }

    /// Label used in logs
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or("<unnamed>")
    }
}
