//! Claimed-job processing shared by every runner.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::Instrument;
use vatom_models::{JobId, JobSpec, JobType, VideoId};
use vatom_queue::{ClaimedJob, FailureOutcome, JobQueue, QueueResult};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::gate::{self, GateDecision};
use crate::handlers::{detect, ingest, render, StageContext};
use crate::logging::JobLogger;
use crate::metrics;

/// How one claimed job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    /// Detection was already done; marked succeeded without running
    Skipped,
    /// Prerequisite stage not done; requeued without penalty
    Deferred { run_after: DateTime<Utc> },
    /// Handler failed with attempts remaining
    Retrying {
        error: String,
        run_after: DateTime<Utc>,
    },
    /// Handler failed on the last attempt
    Failed { error: String },
    /// The job was reclaimed before this worker could record the outcome
    LostOwnership,
}

impl StepOutcome {
    /// Succeeded or skipped.
    pub fn is_complete(&self) -> bool {
        matches!(self, StepOutcome::Succeeded | StepOutcome::Skipped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Succeeded => "succeeded",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Deferred { .. } => "deferred",
            StepOutcome::Retrying { .. } => "retrying",
            StepOutcome::Failed { .. } => "failed",
            StepOutcome::LostOwnership => "lost_ownership",
        }
    }
}

/// Outcome of one job, with its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub job_type: JobType,
    /// Attempt number this claim consumed
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Runs claimed jobs through the gate, the stage handlers and the queue
/// transitions.
pub struct JobExecutor {
    pub(crate) config: WorkerConfig,
    pub(crate) queue: JobQueue,
    pub(crate) stages: StageContext,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, stages: StageContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            queue,
            stages,
            shutdown,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn stages(&self) -> &StageContext {
        &self.stages
    }

    /// Gate, dispatch and record the outcome of a job this worker owns.
    ///
    /// Handler and gate errors become job failures. Only store errors while
    /// recording the outcome are returned; a lost lease is reported as
    /// [`StepOutcome::LostOwnership`].
    pub async fn process_claimed(&self, claimed: ClaimedJob) -> QueueResult<StepReport> {
        let logger = JobLogger::new(claimed.id(), claimed.video_id(), claimed.job_type());
        let span = logger.create_span();

        async move {
            metrics::record_job_claimed(claimed.job_type());
            let started = Instant::now();

            let outcome = match self.step(&claimed, &logger).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_lost_ownership() => {
                    logger.log_warning("job was reclaimed by another worker; outcome dropped");
                    StepOutcome::LostOwnership
                }
                Err(e) => return Err(e),
            };

            metrics::record_job_outcome(
                claimed.job_type(),
                outcome.label(),
                started.elapsed().as_secs_f64(),
            );

            Ok(StepReport {
                job_id: claimed.job.id.clone(),
                video_id: claimed.job.video_id.clone(),
                job_type: claimed.job_type(),
                attempt: claimed.job.attempts,
                outcome,
            })
        }
        .instrument(span)
        .await
    }

    async fn step(&self, claimed: &ClaimedJob, logger: &JobLogger) -> QueueResult<StepOutcome> {
        match gate::check(&self.queue, &self.stages.highlights, &claimed.job).await {
            Ok(GateDecision::Proceed) => {}
            Ok(GateDecision::Defer { waiting_on }) => {
                let run_after = self
                    .queue
                    .defer(&claimed.lease, self.config.dependency_delay)
                    .await?;
                logger.log_progress(&format!(
                    "waiting for {} to succeed, deferred until {}",
                    waiting_on, run_after
                ));
                return Ok(StepOutcome::Deferred { run_after });
            }
            Ok(GateDecision::Skip) => {
                self.queue.mark_succeeded(&claimed.lease).await?;
                logger.log_completion("highlights already detected, skipped");
                return Ok(StepOutcome::Skipped);
            }
            Err(e) => return self.fail(claimed, logger, &e).await,
        }

        logger.log_start(&format!("attempt {}/{}", claimed.job.attempts, claimed.job.max_attempts));

        match self.execute(claimed).await {
            Ok(summary) => {
                self.queue.mark_succeeded(&claimed.lease).await?;
                logger.log_completion(&summary);
                Ok(StepOutcome::Succeeded)
            }
            Err(e) => self.fail(claimed, logger, &e).await,
        }
    }

    async fn fail(
        &self,
        claimed: &ClaimedJob,
        logger: &JobLogger,
        error: &WorkerError,
    ) -> QueueResult<StepOutcome> {
        let message = error.to_string();
        logger.log_error(&message);

        Ok(match self.queue.mark_failed(claimed, &message).await? {
            FailureOutcome::Retrying { run_after } => StepOutcome::Retrying {
                error: message,
                run_after,
            },
            FailureOutcome::Failed => StepOutcome::Failed { error: message },
        })
    }

    /// Run the stage handler; returns a one-line summary.
    async fn execute(&self, claimed: &ClaimedJob) -> WorkerResult<String> {
        let video_id = claimed.video_id();

        match claimed.job.spec()? {
            JobSpec::IngestTranscript(payload) => {
                let report = ingest::ingest_transcript(&self.stages, video_id, &payload).await?;
                Ok(format!("ingested {} transcript segments", report.segments))
            }
            JobSpec::DetectMoments => {
                let report = detect::detect_moments(&self.stages, video_id).await?;
                Ok(format!("stored {} highlights", report.highlights))
            }
            JobSpec::RenderClips => {
                let report = render::render_clips(&self.stages, video_id).await?;
                if report.had_failures {
                    return Err(WorkerError::RenderFailed {
                        failed: report.failed,
                        attempted: report.attempted(),
                    });
                }
                Ok(format!(
                    "rendered {} highlights ({} files)",
                    report.rendered, report.assets
                ))
            }
        }
    }
}
