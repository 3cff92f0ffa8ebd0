//! Extraction scheduling and backfill endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::{BackfillReport, ExtractionRequest};
use crate::{ApiError, ApiResult, AppState};

/// POST /api/recommendation/extract body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBody {
    #[serde(default)]
    pub song_id: Option<String>,
    /// Audio URL
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BackfillResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: BackfillReport,
}

/// POST /api/recommendation/extract
///
/// Queues extraction and returns at once; the outcome is only logged.
pub async fn schedule_extraction(
    State(state): State<AppState>,
    body: Result<Json<ExtractBody>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let song_id = required(body.song_id, "songId")?;
    let file = required(body.file, "file")?;

    let request = ExtractionRequest {
        song_id,
        source_url: file,
        name: body.name,
        album: body.album,
    };
    info!(song_id = %request.song_id, "Feature extraction requested");

    if !state.extraction_pool.submit(request) {
        return Err(ApiError::Unavailable("Extraction pool is shut down".to_string()));
    }

    Ok(Json(ExtractResponse {
        success: true,
        message: "Feature extraction scheduled".to_string(),
    }))
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))
}

/// POST /api/recommendation/backfill
///
/// Runs one backfill pass and answers when every scheduled extraction has
/// settled.
pub async fn trigger_backfill(State(state): State<AppState>) -> Json<BackfillResponse> {
    let report = state.backfill.backfill_missing().await;
    Json(BackfillResponse {
        success: true,
        report,
    })
}

pub fn extraction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recommendation/extract", post(schedule_extraction))
        .route("/api/recommendation/backfill", post(trigger_backfill))
}
