//! Backfill scheduler tests

mod helpers;

use helpers::{
    memory_pool, seed_feature_record, features_with_valence, test_pipeline, FailingCatalog,
    FakeAnalyzerTracker, StaticCatalog,
};
use mrs_recommender::db::{count_feature_records, find_feature_record};
use mrs_recommender::pipeline::{
    spawn_startup_backfill, BackfillReport, BackfillScheduler, ExtractionPool,
};
use mrs_recommender::services::{CatalogSong, SongCatalog};
use sqlx::SqlitePool;
use std::sync::Arc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn audio_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
        .mount(&server)
        .await;
    server
}

fn scheduler(
    db: &SqlitePool,
    catalog: Arc<dyn SongCatalog>,
    tracker: &FakeAnalyzerTracker,
) -> BackfillScheduler {
    let pool = Arc::new(ExtractionPool::start(test_pipeline(db.clone()), tracker.factory(), 3));
    BackfillScheduler::new(catalog, db.clone(), pool)
}

fn song(server: &MockServer, id: &str, file_name: &str) -> CatalogSong {
    StaticCatalog::song(id, Some(format!("{}/uploads/{}", server.uri(), file_name)))
}

#[tokio::test]
async fn test_backfill_extracts_missing_then_finds_nothing() {
    let server = audio_server().await;
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();
    let catalog = StaticCatalog::new(vec![
        song(&server, "a", "0.1_a.mp3"),
        song(&server, "b", "0.2_b.mp3"),
        song(&server, "c", "0.3_c.mp3"),
    ]);
    let scheduler = scheduler(&db, catalog, &tracker);

    let first = scheduler.backfill_missing().await;
    assert_eq!(
        first,
        BackfillReport {
            checked: 3,
            missing: 3,
            scheduled: 3
        }
    );
    assert_eq!(count_feature_records(&db).await.unwrap(), 3);

    // Catalog name is passed through to the stored record
    let record = find_feature_record(&db, "b").await.unwrap().unwrap();
    assert_eq!(record.metadata.name, "Catalog b");

    let second = scheduler.backfill_missing().await;
    assert_eq!(
        second,
        BackfillReport {
            checked: 3,
            missing: 0,
            scheduled: 0
        }
    );
    assert_eq!(tracker.analyzed().len(), 3);
}

#[tokio::test]
async fn test_existing_records_are_skipped() {
    let server = audio_server().await;
    let db = memory_pool().await;
    seed_feature_record(&db, "a", features_with_valence(0.5)).await;

    let tracker = FakeAnalyzerTracker::new();
    let catalog = StaticCatalog::new(vec![
        song(&server, "a", "a.mp3"),
        song(&server, "b", "b.mp3"),
    ]);

    let report = scheduler(&db, catalog, &tracker).backfill_missing().await;
    assert_eq!(report.checked, 2);
    assert_eq!(report.missing, 1);
    assert_eq!(report.scheduled, 1);
    assert_eq!(tracker.analyzed().len(), 1);
}

#[tokio::test]
async fn test_song_without_url_is_missing_but_not_scheduled() {
    let server = audio_server().await;
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();
    let catalog = StaticCatalog::new(vec![
        song(&server, "a", "a.mp3"),
        StaticCatalog::song("no-file", None),
        StaticCatalog::song("blank-file", Some("   ".to_string())),
    ]);

    let report = scheduler(&db, catalog, &tracker).backfill_missing().await;
    assert_eq!(
        report,
        BackfillReport {
            checked: 3,
            missing: 3,
            scheduled: 1
        }
    );
    assert_eq!(count_feature_records(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_song_does_not_cancel_siblings() {
    let server = audio_server().await;
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();
    let catalog = StaticCatalog::new(vec![
        song(&server, "ok-1", "ok_1.mp3"),
        song(&server, "broken", "fail_x.mp3"),
        song(&server, "ok-2", "ok_2.mp3"),
    ]);
    let scheduler = scheduler(&db, catalog, &tracker);

    let report = scheduler.backfill_missing().await;
    assert_eq!(report.scheduled, 3);
    assert!(find_feature_record(&db, "ok-1").await.unwrap().is_some());
    assert!(find_feature_record(&db, "ok-2").await.unwrap().is_some());
    assert!(find_feature_record(&db, "broken").await.unwrap().is_none());

    // Still missing, so the next pass tries it again
    let retry = scheduler.backfill_missing().await;
    assert_eq!(retry.missing, 1);
    assert_eq!(retry.scheduled, 1);
}

#[tokio::test]
async fn test_unavailable_catalog_reports_zero() {
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();

    let report = scheduler(&db, Arc::new(FailingCatalog), &tracker)
        .backfill_missing()
        .await;
    assert_eq!(report, BackfillReport::default());
    assert_eq!(tracker.created(), 0);
}

#[tokio::test]
async fn test_empty_catalog_reports_zero() {
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();

    let report = scheduler(&db, StaticCatalog::empty(), &tracker)
        .backfill_missing()
        .await;
    assert_eq!(report, BackfillReport::default());
}

#[tokio::test]
async fn test_startup_backfill_runs_detached() {
    let server = audio_server().await;
    let db = memory_pool().await;
    let tracker = FakeAnalyzerTracker::new();
    let catalog = StaticCatalog::new(vec![song(&server, "a", "a.mp3"), song(&server, "b", "b.mp3")]);
    let scheduler = Arc::new(scheduler(&db, catalog, &tracker));

    let handle = spawn_startup_backfill(Arc::clone(&scheduler));
    let report = handle.await.unwrap();

    assert_eq!(report.scheduled, 2);
    assert_eq!(count_feature_records(&db).await.unwrap(), 2);
}
