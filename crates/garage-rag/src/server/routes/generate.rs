//! Question answering endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};

use super::{multipart_error, read_document};
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::GenerateResponse;

/// POST /generate - answer `prompt`, optionally ingesting `file` first.
///
/// An optional `k` field overrides the number of retrieved passages.
pub async fn generate_answer(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>> {
    let mut prompt = None;
    let mut document = None;
    let mut k = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("prompt") => prompt = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                // Browsers send an empty part when no file was chosen
                let upload = read_document(field).await?;
                if !upload.data.is_empty() {
                    document = Some(upload);
                }
            }
            Some("k") => {
                let raw = field.text().await.map_err(multipart_error)?;
                let parsed = raw.trim().parse::<usize>().map_err(|_| {
                    Error::invalid_argument(format!("k must be a positive integer, got '{}'", raw))
                })?;
                k = Some(parsed);
            }
            _ => {}
        }
    }

    let prompt = prompt.ok_or_else(|| Error::invalid_argument("multipart field 'prompt' is required"))?;
    tracing::info!("Question: \"{}\"", prompt);

    let outcome = state.engine().ask(&prompt, document.as_ref(), k).await?;

    Ok(Json(GenerateResponse {
        gemini_response: outcome.answer,
        relevant_docs: outcome.passages.into_iter().map(|unit| unit.content).collect(),
        units_added: outcome.units_added,
        context_truncated: outcome.context_truncated,
        generation_error: outcome.generation_error,
    }))
}
