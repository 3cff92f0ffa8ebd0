//! Recommendation endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::recommend::Candidate;
use crate::{ApiResult, AppState};

/// `?limit=` as raw text so malformed values fall back to the default
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SongRecommendationResponse {
    pub success: bool,
    pub cluster: usize,
    pub count: usize,
    pub recommendations: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecommendationResponse {
    pub success: bool,
    pub cluster: usize,
    pub favorites_used: usize,
    pub count: usize,
    pub recommendations: Vec<Candidate>,
}

/// GET /api/recommendation/song/:song_id
pub async fn recommend_for_song(
    State(state): State<AppState>,
    Path(song_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<SongRecommendationResponse>> {
    let limit = state.engine.normalize_limit(query.limit.as_deref());
    let result = state.engine.recommend_for_song(&song_id, limit).await?;

    Ok(Json(SongRecommendationResponse {
        success: true,
        cluster: result.cluster,
        count: result.candidates.len(),
        recommendations: result.candidates,
    }))
}

/// GET /api/recommendation/user/:user_id
pub async fn recommend_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<UserRecommendationResponse>> {
    let limit = state.engine.normalize_limit(query.limit.as_deref());
    let result = state.engine.recommend_for_user(&user_id, limit).await?;

    Ok(Json(UserRecommendationResponse {
        success: true,
        cluster: result.cluster,
        favorites_used: result.favorites_used,
        count: result.candidates.len(),
        recommendations: result.candidates,
    }))
}

pub fn recommendation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recommendation/song/:song_id", get(recommend_for_song))
        .route("/api/recommendation/user/:user_id", get(recommend_for_user))
}
