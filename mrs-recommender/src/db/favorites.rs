//! Favorites persistence

use mrs_common::db::FavoriteRecord;
use mrs_common::Result;
use sqlx::{Row, SqlitePool};

/// A user's favorites, oldest first
///
/// Song values are returned as stored, blank ones included.
pub async fn favorites_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<FavoriteRecord>> {
    let rows = sqlx::query("SELECT user_id, song FROM favorites WHERE user_id = ? ORDER BY id")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| FavoriteRecord {
            user_id: row.get("user_id"),
            song: row.get("song"),
        })
        .collect())
}

/// Add a favorite; returns `false` when the pair already exists
pub async fn add_favorite(pool: &SqlitePool, user_id: &str, song: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO favorites (user_id, song, created_at)
        SELECT ?, ?, ?
        WHERE NOT EXISTS (
            SELECT 1 FROM favorites WHERE user_id = ? AND song = ?
        )
        "#,
    )
    .bind(user_id)
    .bind(song)
    .bind(mrs_common::time::to_storage(&mrs_common::time::now()))
    .bind(user_id)
    .bind(song)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        mrs_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_add_favorite_is_idempotent() {
        let pool = memory_pool().await;

        assert!(add_favorite(&pool, "u1", "s1").await.unwrap());
        assert!(!add_favorite(&pool, "u1", "s1").await.unwrap());
        assert!(add_favorite(&pool, "u1", "s2").await.unwrap());
        assert!(add_favorite(&pool, "u2", "s1").await.unwrap());

        let favorites = favorites_for_user(&pool, "u1").await.unwrap();
        let songs: Vec<_> = favorites.iter().map(|f| f.song.as_str()).collect();
        assert_eq!(songs, vec!["s1", "s2"]);
        assert!(favorites.iter().all(|f| f.user_id == "u1"));
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_favorites() {
        let pool = memory_pool().await;
        assert!(favorites_for_user(&pool, "ghost").await.unwrap().is_empty());
    }
}
