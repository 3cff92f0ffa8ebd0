//! mrs-recommender library interface
//!
//! Audio feature extraction, catalog backfill and cluster-based song
//! recommendation behind an axum HTTP API.

pub mod analyzer;
pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod recommend;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use pipeline::{BackfillScheduler, ExtractionPool};
use recommend::RecommendationEngine;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Feature and favorites store
    pub db: SqlitePool,
    /// Cluster recommendation engine (possibly unavailable)
    pub engine: Arc<RecommendationEngine>,
    /// Bounded extraction workers
    pub extraction_pool: Arc<ExtractionPool>,
    /// Catalog backfill
    pub backfill: Arc<BackfillScheduler>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        engine: Arc<RecommendationEngine>,
        extraction_pool: Arc<ExtractionPool>,
        backfill: Arc<BackfillScheduler>,
    ) -> Self {
        Self {
            db,
            engine,
            extraction_pool,
            backfill,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::extraction_routes())
        .merge(api::recommendation_routes())
        .merge(api::status_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
