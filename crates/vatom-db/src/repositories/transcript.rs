//! Transcript segment repository.

use sqlx::SqlitePool;
use vatom_models::{TranscriptSegment, VideoId};

use crate::error::DbResult;
use crate::models::SegmentRow;
use crate::retry::retry_on_sqlite_busy;

#[derive(Debug, Clone)]
pub struct TranscriptRepository {
    pool: SqlitePool,
}

impl TranscriptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace all segments of a video in one transaction.
    ///
    /// Returns the number of segments written.
    pub async fn replace(&self, video_id: &VideoId, segments: &[TranscriptSegment]) -> DbResult<u64> {
        retry_on_sqlite_busy("replace_transcript", || self.replace_once(video_id, segments)).await
    }

    async fn replace_once(&self, video_id: &VideoId, segments: &[TranscriptSegment]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM transcript_segments WHERE video_id = ?")
            .bind(video_id.as_str())
            .execute(&mut *tx)
            .await?;

        let mut written = 0;
        for segment in segments {
            written += sqlx::query(
                "INSERT INTO transcript_segments (video_id, start_ms, end_ms, text) VALUES (?, ?, ?, ?)",
            )
            .bind(video_id.as_str())
            .bind(segment.start_ms)
            .bind(segment.end_ms)
            .bind(&segment.text)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// All segments of a video in start order.
    pub async fn list(&self, video_id: &VideoId) -> DbResult<Vec<TranscriptSegment>> {
        let rows = sqlx::query_as::<_, SegmentRow>(
            r#"
            SELECT start_ms, end_ms, text FROM transcript_segments
            WHERE video_id = ?
            ORDER BY start_ms, id
            "#,
        )
        .bind(video_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TranscriptSegment::from).collect())
    }

    pub async fn count(&self, video_id: &VideoId) -> DbResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM transcript_segments WHERE video_id = ?")
                .bind(video_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
