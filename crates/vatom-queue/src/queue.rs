//! Job queue on the shared `jobs` table.
//!
//! Every state change is a single SQL statement. Claiming is one
//! `UPDATE … WHERE id = (SELECT … LIMIT 1) RETURNING *`, so two workers can
//! never both own a job: SQLite serializes writers and the losing writer's
//! `status = 'QUEUED'` guard no longer matches. Transitions out of `RUNNING`
//! are fenced by the claim stamp (`locked_at`) and report
//! [`QueueError::LostOwnership`] when the job was reclaimed in between.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vatom_db::time::{datetime_to_ms, duration_ms, ms_from_now, ms_to_datetime, now_ms};
use vatom_db::{retry_on_sqlite_busy, DbResult, JobRow};
use vatom_models::{Job, JobId, JobSpec, JobStatus, JobType, VideoId};

use crate::error::{QueueError, QueueResult};
use crate::policy::{RetryDecision, RetryPolicy};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on reactivate/insert/select rounds in one enqueue call.
const ENQUEUE_MAX_ROUNDS: usize = 5;

const CLAIM_SQL: &str = r#"
    UPDATE jobs
    SET status = 'RUNNING', attempts = attempts + 1, locked_at = ?
    WHERE id = (
        SELECT id FROM jobs
        WHERE status = 'QUEUED' AND run_after <= ?
        ORDER BY run_after, created_at, rowid
        LIMIT 1
    )
    AND status = 'QUEUED'
    RETURNING *
"#;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Attempt ceiling stamped on newly created jobs
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

/// Proof of ownership of a `RUNNING` job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub job_id: JobId,
    /// The `locked_at` value written by the claim, in epoch ms
    pub locked_at_ms: i64,
    /// `attempts` before the claim incremented it
    pub prior_attempts: u32,
}

impl Lease {
    fn for_running(job: &Job) -> Option<Self> {
        let locked_at = job.locked_at?;
        Some(Self {
            job_id: job.id.clone(),
            locked_at_ms: datetime_to_ms(locked_at),
            prior_attempts: job.attempts.saturating_sub(1),
        })
    }
}

/// A job owned by the caller after a successful claim.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: Job,
    pub lease: Lease,
}

impl ClaimedJob {
    pub fn id(&self) -> &JobId {
        &self.job.id
    }

    pub fn video_id(&self) -> &VideoId {
        &self.job.video_id
    }

    pub fn job_type(&self) -> JobType {
        self.job.job_type
    }
}

/// How an enqueue call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueDisposition {
    /// A new job row was inserted
    Created,
    /// A `FAILED` job was reset to `QUEUED`
    Reactivated,
    /// A `QUEUED` or `RUNNING` job already existed and was left as-is
    Existing,
}

/// Result of an enqueue call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnqueueResult {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub disposition: EnqueueDisposition,
}

impl EnqueueResult {
    fn from_row(row: JobRow, disposition: EnqueueDisposition) -> QueueResult<Self> {
        let job = Job::try_from(row)?;
        Ok(Self {
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            disposition,
        })
    }
}

/// Where a failed attempt left the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureOutcome {
    /// Back to `QUEUED`, eligible again at `run_after`
    #[serde(rename = "QUEUED")]
    Retrying { run_after: DateTime<Utc> },
    /// Attempts exhausted
    Failed,
}

impl FailureOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            FailureOutcome::Retrying { .. } => JobStatus::Queued,
            FailureOutcome::Failed => JobStatus::Failed,
        }
    }
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: i64,
    pub running: i64,
    pub succeeded: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.queued + self.running + self.succeeded + self.failed
    }
}

/// SQL-backed job queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    pool: SqlitePool,
    config: QueueConfig,
    policy: RetryPolicy,
}

impl JobQueue {
    /// Create a queue over an already migrated pool.
    pub fn new(pool: SqlitePool, config: QueueConfig) -> Self {
        Self {
            pool,
            config,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Enqueue
    // ------------------------------------------------------------------

    /// Ensure exactly one open job exists for `(video_id, spec.job_type())`.
    ///
    /// A `FAILED` job is reactivated (attempts reset, error cleared, payload
    /// replaced when `spec` carries one). A `QUEUED` or `RUNNING` job is
    /// returned unchanged. Otherwise a new job is created.
    pub async fn enqueue(&self, video_id: &VideoId, spec: &JobSpec) -> QueueResult<EnqueueResult> {
        let job_type = spec.job_type();
        let payload = spec.payload()?.map(|value| value.to_string());
        let payload = payload.as_deref();

        for _ in 0..ENQUEUE_MAX_ROUNDS {
            let reactivated = retry_on_sqlite_busy("reactivate_failed", || {
                self.reactivate_failed(video_id, job_type, payload)
            })
            .await?;
            if let Some(row) = reactivated {
                let result = EnqueueResult::from_row(row, EnqueueDisposition::Reactivated)?;
                info!(job_id = %result.id, video_id = %video_id, job_type = %job_type, "Reactivated failed job");
                return Ok(result);
            }

            let inserted = retry_on_sqlite_busy("insert_job", || {
                self.insert_open(video_id, job_type, payload)
            })
            .await?;
            if let Some(row) = inserted {
                let result = EnqueueResult::from_row(row, EnqueueDisposition::Created)?;
                info!(job_id = %result.id, video_id = %video_id, job_type = %job_type, "Enqueued job");
                return Ok(result);
            }

            let existing = self.find_open(video_id, job_type).await?;
            match existing {
                Some(row) if row.status != JobStatus::Failed.as_str() => {
                    let result = EnqueueResult::from_row(row, EnqueueDisposition::Existing)?;
                    debug!(job_id = %result.id, status = %result.status, "Job already open");
                    return Ok(result);
                }
                // Failed or finished between statements; go again
                _ => continue,
            }
        }

        Err(QueueError::enqueue_failed(format!(
            "open {} job for video {} kept changing",
            job_type, video_id
        )))
    }

    /// Enqueue all three stages of a video's pipeline in order.
    pub async fn enqueue_pipeline(
        &self,
        video_id: &VideoId,
        transcript_locator: &str,
    ) -> QueueResult<Vec<EnqueueResult>> {
        let specs = [
            JobSpec::ingest(transcript_locator),
            JobSpec::DetectMoments,
            JobSpec::RenderClips,
        ];

        let mut results = Vec::with_capacity(specs.len());
        for spec in &specs {
            results.push(self.enqueue(video_id, spec).await?);
        }
        Ok(results)
    }

    async fn reactivate_failed(
        &self,
        video_id: &VideoId,
        job_type: JobType,
        payload: Option<&str>,
    ) -> DbResult<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'QUEUED', attempts = 0, run_after = ?, locked_at = NULL,
                last_error = NULL, payload = COALESCE(?, payload)
            WHERE video_id = ? AND job_type = ? AND status = 'FAILED'
            RETURNING *
            "#,
        )
        .bind(now_ms())
        .bind(payload)
        .bind(video_id.as_str())
        .bind(job_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_open(
        &self,
        video_id: &VideoId,
        job_type: JobType,
        payload: Option<&str>,
    ) -> DbResult<Option<JobRow>> {
        let now = now_ms();
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs
                (id, video_id, job_type, status, attempts, max_attempts, run_after, payload, created_at)
            VALUES (?, ?, ?, 'QUEUED', 0, ?, ?, ?, ?)
            ON CONFLICT (video_id, job_type) WHERE status IN ('QUEUED', 'RUNNING', 'FAILED')
            DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(video_id.as_str())
        .bind(job_type.as_str())
        .bind(i64::from(self.config.max_attempts))
        .bind(now)
        .bind(payload)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_open(&self, video_id: &VideoId, job_type: JobType) -> QueueResult<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE video_id = ? AND job_type = ? AND status IN ('QUEUED', 'RUNNING', 'FAILED')
            LIMIT 1
            "#,
        )
        .bind(video_id.as_str())
        .bind(job_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ------------------------------------------------------------------
    // Claim
    // ------------------------------------------------------------------

    /// Atomically take the next runnable job, if any.
    ///
    /// Runnable means `QUEUED` with `run_after <= now`; the earliest
    /// `run_after` wins, ties broken by creation order. The job comes back
    /// `RUNNING` with `attempts` incremented and `locked_at` stamped.
    pub async fn claim_next(&self) -> QueueResult<Option<ClaimedJob>> {
        let Some(row) = retry_on_sqlite_busy("claim_next", || self.claim_once()).await? else {
            return Ok(None);
        };

        let job = Job::try_from(row)?;
        let lease = Lease::for_running(&job)
            .ok_or_else(|| QueueError::LostOwnership(job.id.clone()))?;

        debug!(
            job_id = %job.id,
            video_id = %job.video_id,
            job_type = %job.job_type,
            attempt = job.attempts,
            "Claimed job"
        );
        Ok(Some(ClaimedJob { job, lease }))
    }

    async fn claim_once(&self) -> DbResult<Option<JobRow>> {
        let now = now_ms();
        let row = sqlx::query_as::<_, JobRow>(CLAIM_SQL)
            .bind(now)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    // ------------------------------------------------------------------
    // Owner transitions
    // ------------------------------------------------------------------

    /// `RUNNING -> SUCCEEDED`, clearing the lock and last error.
    pub async fn mark_succeeded(&self, lease: &Lease) -> QueueResult<()> {
        let rows = retry_on_sqlite_busy("mark_succeeded", || self.succeed_once(lease)).await?;
        ensure_owned(lease, rows)
    }

    /// Route a failed attempt through the retry policy.
    pub async fn mark_failed(&self, claimed: &ClaimedJob, message: &str) -> QueueResult<FailureOutcome> {
        self.apply_failure(
            &claimed.lease,
            claimed.job.attempts,
            claimed.job.max_attempts,
            message,
        )
        .await
    }

    /// Requeue without penalty: `attempts` goes back to its pre-claim value.
    ///
    /// Returns the new `run_after`.
    pub async fn defer(&self, lease: &Lease, delay: Duration) -> QueueResult<DateTime<Utc>> {
        let run_after = ms_from_now(delay);
        let rows =
            retry_on_sqlite_busy("defer", || self.requeue_once(lease, run_after, None)).await?;
        ensure_owned(lease, rows)?;
        Ok(ms_to_datetime(run_after))
    }

    /// Hand the job back immediately without penalty.
    pub async fn release(&self, lease: &Lease) -> QueueResult<()> {
        let run_after = now_ms();
        let rows =
            retry_on_sqlite_busy("release", || self.requeue_once(lease, run_after, None)).await?;
        ensure_owned(lease, rows)
    }

    async fn apply_failure(
        &self,
        lease: &Lease,
        attempts: u32,
        max_attempts: u32,
        message: &str,
    ) -> QueueResult<FailureOutcome> {
        match self.policy.decide(attempts, max_attempts) {
            RetryDecision::Fail => {
                let rows =
                    retry_on_sqlite_busy("mark_failed", || self.fail_once(lease, message)).await?;
                ensure_owned(lease, rows)?;
                warn!(job_id = %lease.job_id, attempts, error = message, "Job failed permanently");
                Ok(FailureOutcome::Failed)
            }
            RetryDecision::Retry(delay) => {
                let run_after = ms_from_now(delay);
                let rows = retry_on_sqlite_busy("mark_retry", || {
                    self.requeue_once(lease, run_after, Some(message))
                })
                .await?;
                ensure_owned(lease, rows)?;
                info!(
                    job_id = %lease.job_id,
                    attempts,
                    retry_in_secs = delay.as_secs(),
                    error = message,
                    "Job scheduled for retry"
                );
                Ok(FailureOutcome::Retrying {
                    run_after: ms_to_datetime(run_after),
                })
            }
        }
    }

    async fn succeed_once(&self, lease: &Lease) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = 'SUCCEEDED', locked_at = NULL, last_error = NULL
            WHERE id = ? AND status = 'RUNNING' AND locked_at = ?
            "#,
        )
        .bind(lease.job_id.as_str())
        .bind(lease.locked_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn fail_once(&self, lease: &Lease, message: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = 'FAILED', locked_at = NULL, last_error = ?
            WHERE id = ? AND status = 'RUNNING' AND locked_at = ?
            "#,
        )
        .bind(message)
        .bind(lease.job_id.as_str())
        .bind(lease.locked_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Back to `QUEUED`. With `error` set this is a penalized retry that keeps
    /// the incremented attempts; without it attempts are restored.
    async fn requeue_once(&self, lease: &Lease, run_after: i64, error: Option<&str>) -> DbResult<u64> {
        let query = match error {
            Some(message) => sqlx::query(
                r#"
                UPDATE jobs SET status = 'QUEUED', run_after = ?, locked_at = NULL, last_error = ?
                WHERE id = ? AND status = 'RUNNING' AND locked_at = ?
                "#,
            )
            .bind(run_after)
            .bind(message),
            None => sqlx::query(
                r#"
                UPDATE jobs SET status = 'QUEUED', run_after = ?, locked_at = NULL, attempts = ?
                WHERE id = ? AND status = 'RUNNING' AND locked_at = ?
                "#,
            )
            .bind(run_after)
            .bind(i64::from(lease.prior_attempts)),
        };

        let result = query
            .bind(lease.job_id.as_str())
            .bind(lease.locked_at_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------
    // Lease reclaim
    // ------------------------------------------------------------------

    /// Fail every `RUNNING` job whose claim is older than `lease_timeout`.
    ///
    /// Expired jobs go through the retry policy like any other failure, so a
    /// job that keeps killing its worker still ends up `FAILED`. Jobs whose
    /// owner finishes during the sweep are skipped.
    pub async fn reclaim_expired(
        &self,
        lease_timeout: Duration,
    ) -> QueueResult<Vec<(JobId, FailureOutcome)>> {
        let cutoff = now_ms().saturating_sub(duration_ms(lease_timeout));
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'RUNNING' AND locked_at IS NOT NULL AND locked_at <= ?
            ORDER BY locked_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let message = format!("lease expired after {}s", lease_timeout.as_secs());
        let mut reclaimed = Vec::with_capacity(rows.len());

        for row in rows {
            let job = Job::try_from(row)?;
            let Some(lease) = Lease::for_running(&job) else {
                continue;
            };

            match self
                .apply_failure(&lease, job.attempts, job.max_attempts, &message)
                .await
            {
                Ok(outcome) => {
                    warn!(job_id = %job.id, video_id = %job.video_id, status = %outcome.status(), "Reclaimed expired job");
                    reclaimed.push((job.id, outcome));
                }
                Err(e) if e.is_lost_ownership() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(reclaimed)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether a `SUCCEEDED` job of this stage exists for the video.
    pub async fn has_succeeded(&self, video_id: &VideoId, job_type: JobType) -> QueueResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM jobs WHERE video_id = ? AND job_type = ? AND status = 'SUCCEEDED' LIMIT 1",
        )
        .bind(video_id.as_str())
        .bind(job_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    pub async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose().map_err(QueueError::from)
    }

    /// Every job of a video, oldest first, including succeeded history.
    pub async fn jobs_for_video(&self, video_id: &VideoId) -> QueueResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE video_id = ? ORDER BY created_at, rowid",
        )
        .bind(video_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Job::try_from(row).map_err(QueueError::from))
            .collect()
    }

    pub async fn counts_by_status(&self) -> QueueResult<StatusCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match JobStatus::parse(&status)? {
                JobStatus::Queued => counts.queued = count,
                JobStatus::Running => counts.running = count,
                JobStatus::Succeeded => counts.succeeded = count,
                JobStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}

fn ensure_owned(lease: &Lease, rows_affected: u64) -> QueueResult<()> {
    if rows_affected == 0 {
        warn!(job_id = %lease.job_id, "Job is no longer owned by this worker");
        return Err(QueueError::LostOwnership(lease.job_id.clone()));
    }
    Ok(())
}
