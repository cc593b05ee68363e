//! Dependency gate checked between claim and dispatch.

use vatom_db::HighlightRepository;
use vatom_models::{Job, JobType};
use vatom_queue::JobQueue;

use crate::error::WorkerResult;

/// What to do with a freshly claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the stage handler
    Proceed,
    /// The prerequisite stage has not succeeded yet
    Defer { waiting_on: JobType },
    /// Detection already done for this video; succeed without running
    Skip,
}

/// Decide whether `job` may run now.
///
/// The dependency check comes first. A `DETECT_MOMENTS` job whose ingest has
/// succeeded is skipped when an earlier detection succeeded and its
/// highlights are still stored.
pub async fn check(
    queue: &JobQueue,
    highlights: &HighlightRepository,
    job: &Job,
) -> WorkerResult<GateDecision> {
    if let Some(dependency) = job.job_type.dependency() {
        if !queue.has_succeeded(&job.video_id, dependency).await? {
            return Ok(GateDecision::Defer {
                waiting_on: dependency,
            });
        }
    }

    if job.job_type == JobType::DetectMoments
        && queue
            .has_succeeded(&job.video_id, JobType::DetectMoments)
            .await?
        && highlights.count(&job.video_id).await? > 0
    {
        return Ok(GateDecision::Skip);
    }

    Ok(GateDecision::Proceed)
}
