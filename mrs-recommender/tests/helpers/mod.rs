//! Test Helper Utilities
//!
//! Shared utilities for testing mrs-recommender

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

pub use fakes::{FailingCatalog, FakeAnalyzerTracker, StaticCatalog};
pub use fixtures::{
    features_with_valence, fixture_assets, seed_feature_record, write_asset_files, CENTERS,
};

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use mrs_recommender::analyzer::AnalyzerFactory;
use mrs_recommender::pipeline::{BackfillScheduler, ExtractionPipeline, ExtractionPool};
use mrs_recommender::recommend::{EngineState, RecommendationEngine};
use mrs_recommender::services::{downloader::default_url_aliases, Downloader, SongCatalog};
use mrs_recommender::{build_router, AppState};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// In-memory database with the full schema
///
/// One connection that never expires, so every query sees the same database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    mrs_common::db::create_schema(&pool).await.unwrap();
    pool
}

/// Extraction pipeline with a short download timeout
pub fn test_pipeline(db: SqlitePool) -> Arc<ExtractionPipeline> {
    let downloader = Downloader::new(Duration::from_secs(5)).unwrap();
    Arc::new(ExtractionPipeline::new(db, downloader, default_url_aliases()))
}

/// Everything an integration test may need to poke at
pub struct TestApp {
    pub db: SqlitePool,
    pub state: AppState,
    pub tracker: FakeAnalyzerTracker,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

/// Build app state around fakes
pub async fn setup_app(engine_state: EngineState, catalog: Arc<dyn SongCatalog>) -> TestApp {
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();
    setup_app_with(db, engine_state, catalog, tracker.factory(), tracker)
}

pub fn setup_app_with(
    db: SqlitePool,
    engine_state: EngineState,
    catalog: Arc<dyn SongCatalog>,
    factory: AnalyzerFactory,
    tracker: FakeAnalyzerTracker,
) -> TestApp {
    let engine = Arc::new(RecommendationEngine::new(engine_state, db.clone(), 10));
    let pool = Arc::new(ExtractionPool::start(test_pipeline(db.clone()), factory, 3));
    let backfill = Arc::new(BackfillScheduler::new(catalog, db.clone(), Arc::clone(&pool)));
    let state = AppState::new(db.clone(), engine, pool, backfill);

    TestApp { db, state, tracker }
}

/// Test helper: build a request, JSON body optional
pub fn test_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Poll `check` until it returns true or `timeout` passes
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
