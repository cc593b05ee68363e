//! Highlight repository.

use sqlx::SqlitePool;
use uuid::Uuid;
use vatom_models::{Highlight, HighlightCandidate, VideoId};

use crate::error::DbResult;
use crate::models::HighlightRow;
use crate::retry::retry_on_sqlite_busy;
use crate::time::now_ms;

#[derive(Debug, Clone)]
pub struct HighlightRepository {
    pool: SqlitePool,
}

impl HighlightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All highlights of a video in rank order.
    pub async fn list(&self, video_id: &VideoId) -> DbResult<Vec<Highlight>> {
        let rows = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, video_id, rank, start_ms, end_ms, title, created_at
            FROM highlights
            WHERE video_id = ?
            ORDER BY rank, created_at
            "#,
        )
        .bind(video_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Highlight::from).collect())
    }

    pub async fn count(&self, video_id: &VideoId) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM highlights WHERE video_id = ?")
            .bind(video_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Persist detected highlights. `candidates` must already be in start order.
    ///
    /// Existing highlights keep their IDs: the first `min(existing, new)` of
    /// them (in rank order) are overwritten positionally and re-ranked
    /// `1..`. Surplus existing rows are left untouched and surplus candidates
    /// are dropped. With no existing highlights every candidate is inserted
    /// with ranks `1..=N`. Returns the number of rows written.
    pub async fn save_detected(
        &self,
        video_id: &VideoId,
        candidates: &[HighlightCandidate],
    ) -> DbResult<usize> {
        retry_on_sqlite_busy("save_highlights", || self.save_detected_once(video_id, candidates))
            .await
    }

    async fn save_detected_once(
        &self,
        video_id: &VideoId,
        candidates: &[HighlightCandidate],
    ) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM highlights WHERE video_id = ? ORDER BY rank, created_at")
                .bind(video_id.as_str())
                .fetch_all(&mut *tx)
                .await?;

        let written = if existing.is_empty() {
            let now = now_ms();
            for (index, candidate) in candidates.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO highlights (id, video_id, rank, start_ms, end_ms, title, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(video_id.as_str())
                .bind(index as i64 + 1)
                .bind(candidate.start_ms)
                .bind(candidate.end_ms)
                .bind(&candidate.title)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            candidates.len()
        } else {
            let pairs = existing.iter().zip(candidates.iter());
            let mut updated = 0;
            for (index, ((id,), candidate)) in pairs.enumerate() {
                sqlx::query(
                    "UPDATE highlights SET rank = ?, start_ms = ?, end_ms = ?, title = ? WHERE id = ?",
                )
                .bind(index as i64 + 1)
                .bind(candidate.start_ms)
                .bind(candidate.end_ms)
                .bind(&candidate.title)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                updated += 1;
            }
            updated
        };

        tx.commit().await?;
        Ok(written)
    }
}
