//! Feature record persistence
//!
//! Records are keyed by `id`, which is always written equal to `song_id`.
//! Lookups still accept a match on either column so rows written by other
//! tools with a different primary key stay reachable.

use chrono::{DateTime, Utc};
use mrs_common::db::{FeatureRecord, SongMetadata};
use mrs_common::time::{from_storage, to_storage};
use mrs_common::{Error, FeatureMap, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashSet;

/// Insert or fully replace the record for `record.song_id`
pub async fn upsert_feature_record(pool: &SqlitePool, record: &FeatureRecord) -> Result<()> {
    let metadata = serde_json::to_string(&record.metadata)?;
    let features = serde_json::to_string(&record.features)?;

    sqlx::query(
        r#"
        INSERT INTO song_features (id, song_id, file, metadata, features, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            song_id = excluded.song_id,
            file = excluded.file,
            metadata = excluded.metadata,
            features = excluded.features,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&record.song_id)
    .bind(&record.song_id)
    .bind(&record.file)
    .bind(metadata)
    .bind(features)
    .bind(to_storage(&record.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Record by primary key, falling back to the `song_id` column
pub async fn find_feature_record(pool: &SqlitePool, song_id: &str) -> Result<Option<FeatureRecord>> {
    let by_id = sqlx::query(
        "SELECT id, song_id, file, metadata, features, updated_at FROM song_features WHERE id = ?",
    )
    .bind(song_id)
    .fetch_optional(pool)
    .await?;

    let row = match by_id {
        Some(row) => Some(row),
        None => {
            sqlx::query(
                r#"
                SELECT id, song_id, file, metadata, features, updated_at
                FROM song_features
                WHERE song_id = ?
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
            )
            .bind(song_id)
            .fetch_optional(pool)
            .await?
        }
    };

    row.map(|r| record_from_row(&r)).transpose()
}

/// Records whose primary key or `song_id` is in `ids`
pub async fn find_feature_records_by_ids(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<Vec<FeatureRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, song_id, file, metadata, features, updated_at FROM song_features WHERE id IN (",
    );
    push_id_list(&mut builder, ids);
    builder.push(") OR song_id IN (");
    push_id_list(&mut builder, ids);
    builder.push(") ORDER BY id");

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(record_from_row).collect()
}

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[String]) {
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
}

/// Every identifier that already has features (primary keys and `song_id`s)
pub async fn existing_song_ids(pool: &SqlitePool) -> Result<HashSet<String>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM song_features UNION SELECT song_id FROM song_features")
            .fetch_all(pool)
            .await?;
    Ok(ids.into_iter().collect())
}

/// Number of stored feature records
pub async fn count_feature_records(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM song_features")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Most recent `updated_at` across all records
pub async fn latest_feature_update(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>> {
    let latest: Option<String> = sqlx::query_scalar("SELECT MAX(updated_at) FROM song_features")
        .fetch_one(pool)
        .await?;
    Ok(latest.as_deref().and_then(from_storage))
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<FeatureRecord> {
    let metadata: String = row.get("metadata");
    let features: String = row.get("features");
    let updated_at: String = row.get("updated_at");

    let metadata: SongMetadata = serde_json::from_str(&metadata)?;
    let features: FeatureMap = serde_json::from_str(&features)?;
    let updated_at = from_storage(&updated_at)
        .ok_or_else(|| Error::Internal(format!("Bad updated_at value: {}", updated_at)))?;

    Ok(FeatureRecord {
        song_id: row.get("song_id"),
        file: row.get("file"),
        metadata,
        features,
        updated_at,
    })
}
