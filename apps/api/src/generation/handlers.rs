//! Axum route handlers for the CV API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{DisplayProjection, RawRecord};
use crate::state::AppState;

/// POST /api/v1/cv
///
/// Normalizes the posted fields and returns the rendered PDF.
pub async fn handle_generate(
    State(state): State<AppState>,
    payload: Result<Json<RawRecord>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(record) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let request_id = Uuid::new_v4();
    let bytes = state
        .pipeline
        .generate(&record)
        .instrument(info_span!("generate_cv", %request_id))
        .await?;

    let disposition = format!(
        "attachment; filename=\"cv-{}.pdf\"",
        Utc::now().format("%Y%m%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// POST /api/v1/cv/preview
///
/// Returns the display projection the template would receive. No rendering.
pub async fn handle_preview(
    State(state): State<AppState>,
    payload: Result<Json<RawRecord>, JsonRejection>,
) -> Result<Json<DisplayProjection>, AppError> {
    let Json(record) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    Ok(Json(state.pipeline.preview(&record)))
}
