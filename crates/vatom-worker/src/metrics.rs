//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use vatom_models::JobType;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_CLAIMED_TOTAL: &str = "vatom_jobs_claimed_total";
    pub const JOB_OUTCOMES_TOTAL: &str = "vatom_job_outcomes_total";
    pub const JOBS_RECLAIMED_TOTAL: &str = "vatom_jobs_reclaimed_total";
    pub const JOB_DURATION_SECONDS: &str = "vatom_job_duration_seconds";
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_job_claimed(job_type: JobType) {
    let labels = [("job_type", job_type.as_str().to_string())];
    counter!(names::JOBS_CLAIMED_TOTAL, &labels).increment(1);
}

/// Record how a claimed job ended (`succeeded`, `skipped`, `deferred`, ...).
pub fn record_job_outcome(job_type: JobType, outcome: &str, duration_secs: f64) {
    let labels = [
        ("job_type", job_type.as_str().to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::JOB_OUTCOMES_TOTAL, &labels).increment(1);

    let labels = [("job_type", job_type.as_str().to_string())];
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_jobs_reclaimed(count: usize) {
    counter!(names::JOBS_RECLAIMED_TOTAL).increment(count as u64);
}
