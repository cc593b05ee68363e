//! Row models and their conversions to domain types.

use sqlx::FromRow;
use vatom_models::{
    ClipAsset, Highlight, Job, JobId, JobStatus, JobType, Orientation, TranscriptSegment, Video,
    VideoId,
};

use crate::error::{DbError, DbResult};
use crate::time::ms_to_datetime;

#[derive(Debug, Clone, FromRow)]
pub struct VideoRow {
    pub id: String,
    pub source_path: String,
    pub original_filename: Option<String>,
    pub created_at: i64,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: VideoId::from_string(row.id),
            source_path: row.source_path,
            original_filename: row.original_filename,
            created_at: ms_to_datetime(row.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SegmentRow {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

impl From<SegmentRow> for TranscriptSegment {
    fn from(row: SegmentRow) -> Self {
        TranscriptSegment::new(row.start_ms, row.end_ms, row.text)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct HighlightRow {
    pub id: String,
    pub video_id: String,
    pub rank: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub title: String,
    pub created_at: i64,
}

impl From<HighlightRow> for Highlight {
    fn from(row: HighlightRow) -> Self {
        Highlight {
            id: row.id,
            video_id: VideoId::from_string(row.video_id),
            rank: u32::try_from(row.rank).unwrap_or(0),
            start_ms: row.start_ms,
            end_ms: row.end_ms,
            title: row.title,
            created_at: ms_to_datetime(row.created_at),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ClipAssetRow {
    pub id: String,
    pub video_id: String,
    pub highlight_id: String,
    pub orientation: String,
    pub file_path: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub created_at: i64,
}

impl TryFrom<ClipAssetRow> for ClipAsset {
    type Error = DbError;

    fn try_from(row: ClipAssetRow) -> DbResult<Self> {
        Ok(ClipAsset {
            id: row.id,
            video_id: VideoId::from_string(row.video_id),
            highlight_id: row.highlight_id,
            orientation: Orientation::parse(&row.orientation)?,
            file_path: row.file_path,
            start_ms: row.start_ms,
            end_ms: row.end_ms,
            created_at: ms_to_datetime(row.created_at),
        })
    }
}

/// A raw `jobs` row.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub video_id: String,
    pub job_type: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub run_after: i64,
    pub locked_at: Option<i64>,
    pub last_error: Option<String>,
    pub payload: Option<String>,
    pub created_at: i64,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> DbResult<Self> {
        // Unparseable payload text is kept as a JSON string so that decoding
        // the `JobSpec` fails inside the handler, not at claim time.
        let payload = row.payload.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        });

        Ok(Job {
            id: JobId::from_string(row.id),
            video_id: VideoId::from_string(row.video_id),
            job_type: JobType::parse(&row.job_type)?,
            status: JobStatus::parse(&row.status)?,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            max_attempts: u32::try_from(row.max_attempts).unwrap_or(1),
            run_after: ms_to_datetime(row.run_after),
            locked_at: row.locked_at.map(ms_to_datetime),
            last_error: row.last_error,
            payload,
            created_at: ms_to_datetime(row.created_at),
        })
    }
}
