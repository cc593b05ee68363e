//! Driving loops: bounded batch and continuous poll.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use vatom_models::VideoId;
use vatom_queue::QueueResult;

use crate::dispatcher::{JobExecutor, StepReport};
use crate::error::WorkerResult;
use crate::metrics;

/// Pause after a failed poll iteration.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Nothing was claimable
    Idle,
    Processed,
}

/// Result of one bounded batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<StepReport>,
    /// Store error that cut the batch short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobExecutor {
    /// Claim and process at most one job.
    pub async fn run_once(&self) -> QueueResult<Option<StepReport>> {
        let Some(claimed) = self.queue.claim_next().await? else {
            return Ok(None);
        };
        self.process_claimed(claimed).await.map(Some)
    }

    /// Process up to `limit` jobs of a single video.
    ///
    /// A claimed job of a different video than the previous one is released
    /// untouched and ends the batch, as does any outcome other than
    /// succeeded or skipped. A store error after the first job keeps the
    /// reports gathered so far and is carried in [`BatchReport::error`].
    pub async fn run_batch(&self, limit: usize) -> QueueResult<BatchReport> {
        self.reclaim_expired().await;

        let mut results: Vec<StepReport> = Vec::new();
        let error = match self.fill_batch(limit, &mut results).await {
            Ok(()) => None,
            Err(e) if results.is_empty() => return Err(e),
            Err(e) => {
                error!(processed = results.len(), "Batch stopped by store error: {}", e);
                Some(e.to_string())
            }
        };

        let status = if results.is_empty() {
            BatchStatus::Idle
        } else {
            BatchStatus::Processed
        };
        Ok(BatchReport {
            status,
            results,
            error,
        })
    }

    async fn fill_batch(&self, limit: usize, results: &mut Vec<StepReport>) -> QueueResult<()> {
        let mut last_video: Option<VideoId> = None;

        for _ in 0..limit {
            let Some(claimed) = self.queue.claim_next().await? else {
                break;
            };

            if let Some(previous) = &last_video {
                if previous != claimed.video_id() {
                    debug!(
                        job_id = %claimed.id(),
                        video_id = %claimed.video_id(),
                        "Next job belongs to another video, releasing"
                    );
                    match self.queue.release(&claimed.lease).await {
                        Ok(()) => {}
                        Err(e) if e.is_lost_ownership() => {
                            warn!(job_id = %claimed.id(), "Released job was already reclaimed");
                        }
                        Err(e) => return Err(e),
                    }
                    break;
                }
            }

            let report = self.process_claimed(claimed).await?;
            let complete = report.outcome.is_complete();
            let video_id = report.video_id.clone();
            results.push(report);

            if !complete {
                break;
            }
            last_video = Some(video_id);
        }

        Ok(())
    }

    /// Process jobs until none is claimable right now.
    ///
    /// Deferred and retrying jobs are scheduled in the future, so this
    /// returns once the runnable work is drained.
    pub async fn run_until_idle(&self) -> QueueResult<Vec<StepReport>> {
        let mut reports = Vec::new();
        while let Some(report) = self.run_once().await? {
            reports.push(report);
        }
        Ok(reports)
    }

    /// Poll until [`shutdown`](Self::shutdown) is called.
    ///
    /// Sleeps only when no job was claimed. A job in progress is always
    /// finished before the loop observes shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            lease_timeout_secs = self.config.lease_timeout.map(|d| d.as_secs()),
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut last_reclaim: Option<Instant> = None;

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            let reclaim_due = match last_reclaim {
                Some(at) => at.elapsed() >= self.config.reclaim_interval,
                None => true,
            };
            if reclaim_due {
                self.reclaim_expired().await;
                last_reclaim = Some(Instant::now());
            }

            let pause = match self.run_once().await {
                Ok(Some(_)) => None,
                Ok(None) => Some(self.config.poll_interval),
                Err(e) => {
                    error!("Error processing jobs: {}", e);
                    Some(ERROR_BACKOFF)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        Ok(())
    }

    /// Signal [`run`](Self::run) to stop after the current job.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send_replace(true);
    }

    async fn reclaim_expired(&self) {
        let Some(lease_timeout) = self.config.lease_timeout else {
            return;
        };

        match self.queue.reclaim_expired(lease_timeout).await {
            Ok(reclaimed) if !reclaimed.is_empty() => {
                metrics::record_jobs_reclaimed(reclaimed.len());
                warn!(count = reclaimed.len(), "Reclaimed jobs with expired leases");
            }
            Ok(_) => {}
            Err(e) => warn!("Lease reclaim failed: {}", e),
        }
    }
}
