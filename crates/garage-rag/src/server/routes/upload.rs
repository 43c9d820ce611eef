//! PDF upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};

use super::{multipart_error, read_document};
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::IngestResponse;

/// POST /upload - ingest the PDF sent in the `file` field
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let mut document = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            document = Some(read_document(field).await?);
        }
    }

    let document =
        document.ok_or_else(|| Error::invalid_argument("multipart field 'file' is required"))?;
    let report = state.pipeline().ingest_document(&document).await?;

    let message = if report.units_added == 0 {
        format!("No text found in {}", document.display_name())
    } else {
        format!(
            "{} processed: {} passages indexed",
            document.display_name(),
            report.units_added
        )
    };

    Ok(Json(IngestResponse {
        message,
        units_added: report.units_added,
        index_size: report.index_size,
    }))
}
