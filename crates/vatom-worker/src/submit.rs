//! Submitting a registered video for processing.

use tracing::info;
use vatom_db::VideoRepository;
use vatom_models::VideoId;
use vatom_queue::{EnqueueResult, JobQueue};

use crate::error::{WorkerError, WorkerResult};

/// Enqueue the three pipeline stages of a video whose source is uploaded.
///
/// A video still carrying the pending source placeholder is refused before
/// any job row is written, since its render stage could never succeed.
pub async fn submit_video(
    videos: &VideoRepository,
    queue: &JobQueue,
    video_id: &VideoId,
    transcript_locator: &str,
) -> WorkerResult<Vec<EnqueueResult>> {
    let video = videos.require(video_id).await?;
    if video.is_source_pending() {
        return Err(WorkerError::SourcePending(video_id.clone()));
    }

    let jobs = queue.enqueue_pipeline(video_id, transcript_locator).await?;
    info!(video_id = %video_id, jobs = jobs.len(), "Submitted video for processing");
    Ok(jobs)
}
