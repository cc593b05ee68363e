//! Clip asset repository.

use sqlx::SqlitePool;
use uuid::Uuid;
use vatom_models::{ClipAsset, Highlight, Orientation, VideoId};

use crate::error::DbResult;
use crate::models::ClipAssetRow;
use crate::time::now_ms;

#[derive(Debug, Clone)]
pub struct ClipAssetRepository {
    pool: SqlitePool,
}

impl ClipAssetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove every clip record of a video. Files on disk are not touched.
    pub async fn delete_for_video(&self, video_id: &VideoId) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM clip_assets WHERE video_id = ?")
            .bind(video_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Record one rendered file for a highlight.
    pub async fn insert(
        &self,
        highlight: &Highlight,
        orientation: Orientation,
        file_path: &str,
    ) -> DbResult<ClipAsset> {
        let row = sqlx::query_as::<_, ClipAssetRow>(
            r#"
            INSERT INTO clip_assets
                (id, video_id, highlight_id, orientation, file_path, start_ms, end_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, video_id, highlight_id, orientation, file_path, start_ms, end_ms, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(highlight.video_id.as_str())
        .bind(&highlight.id)
        .bind(orientation.as_str())
        .bind(file_path)
        .bind(highlight.start_ms)
        .bind(highlight.end_ms)
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await?;

        ClipAsset::try_from(row)
    }

    /// Clip records of a video in insertion order.
    pub async fn list(&self, video_id: &VideoId) -> DbResult<Vec<ClipAsset>> {
        let rows = sqlx::query_as::<_, ClipAssetRow>(
            r#"
            SELECT id, video_id, highlight_id, orientation, file_path, start_ms, end_ms, created_at
            FROM clip_assets
            WHERE video_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(video_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ClipAsset::try_from).collect()
    }
}
