//! Service status for the admin UI

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub assets_loaded: bool,
    pub feature_count: i64,
    pub last_feature_at: Option<DateTime<Utc>>,
}

/// GET /api/recommendation/status
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let feature_count = db::count_feature_records(&state.db).await?;
    let last_feature_at = db::latest_feature_update(&state.db).await?;

    Ok(Json(StatusResponse {
        assets_loaded: state.engine.is_available(),
        feature_count,
        last_feature_at,
    }))
}

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/api/recommendation/status", get(get_status))
}
