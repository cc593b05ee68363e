//! Durable, multi-worker job queue on a shared SQLite store.
//!
//! This crate provides:
//! - Idempotent enqueue per (video, stage) with reactivation of failed jobs
//! - Atomic claim of the next runnable job across concurrent workers
//! - Owner-fenced transitions: succeed, fail with backoff, defer, release
//! - Optional reclaim of jobs whose worker lease has expired
//! - Pipeline inspection (per-video jobs, status counts)

pub mod error;
pub mod policy;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use policy::{RetryDecision, RetryPolicy};
pub use queue::{
    ClaimedJob, EnqueueDisposition, EnqueueResult, FailureOutcome, JobQueue, Lease, QueueConfig,
    StatusCounts,
};
