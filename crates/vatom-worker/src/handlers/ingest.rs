//! `INGEST_TRANSCRIPT`: load a transcript document into the video's segments.

use serde::Serialize;
use tracing::info;
use vatom_models::{IngestPayload, VideoId};

use super::transcript::parse_transcript;
use super::StageContext;
use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub segments: usize,
}

/// Fetch, validate and store the transcript named by `payload`.
///
/// Existing segments of the video are replaced atomically, so a rerun
/// leaves exactly one copy.
pub async fn ingest_transcript(
    ctx: &StageContext,
    video_id: &VideoId,
    payload: &IngestPayload,
) -> WorkerResult<IngestReport> {
    let locator = payload.locator().ok_or_else(|| {
        WorkerError::invalid_input("INGEST_TRANSCRIPT payload has no transcriptUrl or transcriptPath")
    })?;

    ctx.videos.require(video_id).await?;

    let raw = ctx.resolver.read_text(locator).await?;
    let segments = parse_transcript(&raw)?;

    ctx.transcripts.replace(video_id, &segments).await?;

    info!(video_id = %video_id, locator, segments = segments.len(), "Ingested transcript");
    Ok(IngestReport {
        segments: segments.len(),
    })
}
