//! Video repository.

use sqlx::SqlitePool;
use vatom_models::{Video, VideoId};

use crate::error::{DbError, DbResult};
use crate::models::VideoRow;
use crate::time::now_ms;

#[derive(Debug, Clone)]
pub struct VideoRepository {
    pool: SqlitePool,
}

impl VideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a video under a freshly generated ID.
    pub async fn create(
        &self,
        source_path: &str,
        original_filename: Option<&str>,
    ) -> DbResult<Video> {
        self.create_with_id(&VideoId::new(), source_path, original_filename)
            .await
    }

    /// Register a video under a caller-chosen ID.
    pub async fn create_with_id(
        &self,
        id: &VideoId,
        source_path: &str,
        original_filename: Option<&str>,
    ) -> DbResult<Video> {
        let row = sqlx::query_as::<_, VideoRow>(
            r#"
            INSERT INTO videos (id, source_path, original_filename, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, source_path, original_filename, created_at
            "#,
        )
        .bind(id.as_str())
        .bind(source_path)
        .bind(original_filename)
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get(&self, id: &VideoId) -> DbResult<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>(
            "SELECT id, source_path, original_filename, created_at FROM videos WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Video::from))
    }

    /// Like [`get`](Self::get) but a missing video is an error.
    pub async fn require(&self, id: &VideoId) -> DbResult<Video> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Video", id.as_str()))
    }

    pub async fn exists(&self, id: &VideoId) -> DbResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM videos WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Point the video at its uploaded source media.
    pub async fn set_source_path(&self, id: &VideoId, source_path: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE videos SET source_path = ? WHERE id = ?")
            .bind(source_path)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Video", id.as_str()));
        }
        Ok(())
    }
}
