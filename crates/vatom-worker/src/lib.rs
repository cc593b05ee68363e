//! Pipeline worker.
//!
//! This crate provides:
//! - The dependency gate between claim and dispatch
//! - Stage handlers for transcript ingest, highlight detection and clip rendering
//! - [`JobExecutor`], which routes a claimed job to its handler and records the outcome
//! - Submission of uploaded videos as three-stage pipelines
//! - A bounded batch runner and a continuous poll loop sharing that routine
//! - Environment configuration, structured job logging and Prometheus metrics

pub mod bootstrap;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod submit;

pub use config::{DatabaseConfig, WorkerConfig};
pub use dispatcher::{JobExecutor, StepOutcome, StepReport};
pub use error::{WorkerError, WorkerResult};
pub use gate::GateDecision;
pub use handlers::StageContext;
pub use logging::JobLogger;
pub use runner::{BatchReport, BatchStatus};
pub use submit::submit_video;
