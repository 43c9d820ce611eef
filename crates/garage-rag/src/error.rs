//! Error types for the retrieval engine and its HTTP surface

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for garage-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while ingesting, indexing, retrieving or generating
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The uploaded document could not be decoded
    #[error("Failed to parse document: {0}")]
    DocumentParse(String),

    /// The uploaded content is not a PDF
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The embedding model failed on the given text
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// The durable index snapshot exists but cannot be read back
    #[error("Index snapshot '{}' is corrupt: {reason}", path.display())]
    StorageCorrupt { path: PathBuf, reason: String },

    /// A vector disagrees with the dimension fixed by the index
    #[error("Dimension mismatch during {operation}: index expects {expected}, got {actual}")]
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An insert batch paired a different number of vectors and texts
    #[error("Batch length mismatch: {vectors} vectors for {texts} texts")]
    BatchLengthMismatch { vectors: usize, texts: usize },

    /// An insert batch contained a blank text unit
    #[error("Text unit at batch position {0} is empty")]
    EmptyTextUnit(usize),

    /// A caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The generation service (or another remote dependency) failed or timed out
    #[error("{service} request failed: {message}")]
    ExternalService {
        service: String,
        message: String,
        /// Whether repeating the request may succeed
        retryable: bool,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a document parse error
    pub fn document_parse(message: impl Into<String>) -> Self {
        Self::DocumentParse(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a storage corruption error for the snapshot at `path`
    pub fn storage_corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StorageCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a retryable external service error (connection failure, timeout)
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Create an external service error that repeating the request cannot fix
    pub fn external_permanent(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Create an error from a non-success HTTP response.
    ///
    /// Server errors and 429 are retryable; other client errors (bad key,
    /// unknown model, malformed request) are not.
    pub async fn from_response(service: impl Into<String>, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("<unreadable body: {}>", e),
        };
        Self::ExternalService {
            service: service.into(),
            message: format!("HTTP {}: {}", status, body),
            retryable: is_retryable_status(status),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable error kind, used in API bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::DocumentParse(_) => "document_parse_error",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Embedding(_) => "embedding_error",
            Error::StorageCorrupt { .. } => "storage_corrupt",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::BatchLengthMismatch { .. } => "batch_length_mismatch",
            Error::EmptyTextUnit(_) => "empty_text_unit",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::ExternalService { .. } => "external_service_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether the failure may go away if the same request is repeated
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ExternalService { retryable, .. } => *retryable,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::DocumentParse(_)
            | Error::EmptyTextUnit(_)
            | Error::InvalidArgument(_)
            | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::ExternalService { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_)
            | Error::Embedding(_)
            | Error::StorageCorrupt { .. }
            | Error::DimensionMismatch { .. }
            | Error::BatchLengthMismatch { .. }
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "Request failed: {}", self);
        } else {
            tracing::warn!(kind = self.kind(), "Request rejected: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_statuses() {
        assert_eq!(
            Error::UnsupportedFormat("text/plain".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            Error::external("gemini", "timeout").status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::storage_corrupt("/tmp/index.bin", "bad magic").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Error::document_parse("eof").kind(), "document_parse_error");
    }

    #[test]
    fn test_dimension_mismatch_message_names_operation() {
        let err = Error::DimensionMismatch {
            operation: "search",
            expected: 384,
            actual: 768,
        };
        let message = err.to_string();
        assert!(message.contains("search"));
        assert!(message.contains("384"));
        assert!(message.contains("768"));
        assert!(!err.is_transient());
        assert!(Error::external("ollama", "refused").is_transient());
        assert!(!Error::external_permanent("gemini", "API key not valid").is_transient());
        assert!(!Error::embedding("model returned 768 dimensions, expected 384").is_transient());
    }

    fn http_response(status: u16, body: &str) -> reqwest::Response {
        reqwest::Response::from(
            axum::http::Response::builder()
                .status(status)
                .body(body.to_string())
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_from_response_keeps_status_and_body() {
        let err = Error::from_response("gemini", http_response(403, "API key not valid")).await;
        let message = err.to_string();
        assert!(message.contains("403"));
        assert!(message.contains("API key not valid"));
        assert!(!err.is_transient());

        let err = Error::from_response("ollama", http_response(503, "loading model")).await;
        assert!(err.is_transient());
        assert_eq!(err.kind(), "external_service_error");
    }

    #[test]
    fn test_retryable_statuses() {
        use reqwest::StatusCode as S;
        assert!(is_retryable_status(S::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(S::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(S::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(S::BAD_REQUEST));
        assert!(!is_retryable_status(S::FORBIDDEN));
        assert!(!is_retryable_status(S::NOT_FOUND));
    }
}
