//! HTTP routes for the garage-rag server

pub mod generate;
pub mod upload;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{IndexInfo, UploadedDocument};

/// Build all routes
pub fn routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        // Uploads carry whole PDFs
        .route(
            "/upload",
            post(upload::upload_pdf).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/generate",
            post(generate::generate_answer).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/api/info", get(info))
}

/// GET / - liveness banner
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "garage-rag is running. POST a PDF to /upload, ask questions at /generate."
    }))
}

/// GET /api/info - index and provider summary
async fn info(State(state): State<AppState>) -> Json<IndexInfo> {
    Json(IndexInfo {
        name: "garage-rag".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_size: state.index().len(),
        dimensions: state.index().dimensions(),
        embedder: state.embedder().name().to_string(),
        generator: state.generator().name().to_string(),
        generator_model: state.generator().model().to_string(),
        default_top_k: state.engine().retriever().default_k(),
    })
}

/// Read a multipart file field into an upload
pub(crate) async fn read_document(field: Field<'_>) -> Result<UploadedDocument> {
    let filename = field.file_name().map(|s| s.to_string());
    let content_type = field.content_type().map(|s| s.to_string());
    // Unnamed parts still get a distinct label in the logs
    let label = filename
        .clone()
        .unwrap_or_else(|| format!("unnamed upload {}", Uuid::new_v4()));
    let data = field
        .bytes()
        .await
        .map_err(|e| Error::invalid_argument(format!("Failed to read file {}: {}", label, e)))?;

    tracing::info!(
        "Received {} ({} bytes, {})",
        label,
        data.len(),
        content_type.as_deref().unwrap_or("no content type")
    );

    Ok(UploadedDocument {
        filename,
        content_type,
        data,
    })
}

/// Map a malformed multipart body to a client error
pub(crate) fn multipart_error(e: axum::extract::multipart::MultipartError) -> Error {
    Error::invalid_argument(format!("Failed to read multipart field: {}", e))
}
