//! Pipeline job definitions.
//!
//! A video is processed by three stage jobs that run in a fixed order:
//! transcript ingestion, moment detection and clip rendering. Ordering is
//! encoded as data (see [`JobType::dependency`]) and enforced by the worker's
//! dependency gate, not by in-process control flow.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::VideoId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage. Variants are declared in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    /// Fetch and store timed transcript segments
    IngestTranscript,
    /// Ask the language model for highlight moments
    DetectMoments,
    /// Cut horizontal and vertical clips for every highlight
    RenderClips,
}

impl JobType {
    /// All stages in pipeline order.
    pub const ALL: [JobType; 3] = [
        JobType::IngestTranscript,
        JobType::DetectMoments,
        JobType::RenderClips,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::IngestTranscript => "INGEST_TRANSCRIPT",
            JobType::DetectMoments => "DETECT_MOMENTS",
            JobType::RenderClips => "RENDER_CLIPS",
        }
    }

    pub fn parse(s: &str) -> ModelResult<Self> {
        match s {
            "INGEST_TRANSCRIPT" => Ok(JobType::IngestTranscript),
            "DETECT_MOMENTS" => Ok(JobType::DetectMoments),
            "RENDER_CLIPS" => Ok(JobType::RenderClips),
            other => Err(ModelError::UnknownJobType(other.to_string())),
        }
    }

    /// The sibling stage that must have succeeded before this one may run.
    pub fn dependency(&self) -> Option<JobType> {
        match self {
            JobType::IngestTranscript => None,
            JobType::DetectMoments => Some(JobType::IngestTranscript),
            JobType::RenderClips => Some(JobType::DetectMoments),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status.
///
/// `Queued -> Running -> {Queued, Succeeded, Failed}`. A `Failed` job stays
/// failed until an explicit re-enqueue reactivates it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting for `run_after` and a worker
    #[default]
    Queued,
    /// Owned by exactly one worker
    Running,
    /// Finished; kept as history
    Succeeded,
    /// Attempts exhausted
    Failed,
}

impl JobStatus {
    /// Statuses that occupy the single open slot per (video, stage).
    pub const OPEN: [JobStatus; 3] = [JobStatus::Queued, JobStatus::Running, JobStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> ModelResult<Self> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(ModelError::UnknownJobStatus(other.to_string())),
        }
    }

    /// Check if this status still occupies the open slot for its stage.
    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `INGEST_TRANSCRIPT` job.
///
/// Either locator may be set; a URL wins over a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "transcript_url")]
    pub transcript_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "transcript_path")]
    pub transcript_path: Option<String>,
}

impl IngestPayload {
    /// Build a payload from a transcript locator, routing URLs and paths.
    pub fn from_locator(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        if locator.starts_with("http://") || locator.starts_with("https://") {
            Self {
                transcript_url: Some(locator),
                transcript_path: None,
            }
        } else {
            Self {
                transcript_url: None,
                transcript_path: Some(locator),
            }
        }
    }

    /// The transcript source to fetch, if any.
    pub fn locator(&self) -> Option<&str> {
        self.transcript_url
            .as_deref()
            .or(self.transcript_path.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Typed job specification, one variant per stage.
///
/// The job row stores only the stage type and the JSON form of the variant's
/// payload; [`JobSpec::decode`] restores the typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSpec {
    IngestTranscript(IngestPayload),
    DetectMoments,
    RenderClips,
}

impl JobSpec {
    /// Ingest spec for a transcript URL or file path.
    pub fn ingest(locator: impl Into<String>) -> Self {
        JobSpec::IngestTranscript(IngestPayload::from_locator(locator))
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobSpec::IngestTranscript(_) => JobType::IngestTranscript,
            JobSpec::DetectMoments => JobType::DetectMoments,
            JobSpec::RenderClips => JobType::RenderClips,
        }
    }

    /// JSON payload to persist; `None` for stages without one and for an
    /// ingest spec that names no transcript.
    pub fn payload(&self) -> ModelResult<Option<serde_json::Value>> {
        match self {
            JobSpec::IngestTranscript(payload) if payload.locator().is_none() => Ok(None),
            JobSpec::IngestTranscript(payload) => serde_json::to_value(payload)
                .map(Some)
                .map_err(|e| ModelError::invalid_payload(self.job_type().as_str(), e.to_string())),
            JobSpec::DetectMoments | JobSpec::RenderClips => Ok(None),
        }
    }

    /// Restore a typed spec from a stored stage type and payload.
    pub fn decode(job_type: JobType, payload: Option<&serde_json::Value>) -> ModelResult<Self> {
        match job_type {
            JobType::IngestTranscript => {
                let payload = match payload {
                    None | Some(serde_json::Value::Null) => IngestPayload::default(),
                    Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                        ModelError::invalid_payload(job_type.as_str(), e.to_string())
                    })?,
                };
                Ok(JobSpec::IngestTranscript(payload))
            }
            JobType::DetectMoments => Ok(JobSpec::DetectMoments),
            JobType::RenderClips => Ok(JobSpec::RenderClips),
        }
    }
}

/// A persisted pipeline job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Video this job operates on
    pub video_id: VideoId,

    /// Pipeline stage
    pub job_type: JobType,

    pub status: JobStatus,

    /// Claim events so far
    pub attempts: u32,

    pub max_attempts: u32,

    /// Not claimable before this instant
    pub run_after: DateTime<Utc>,

    /// Set while a worker owns the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Stage payload in its stored JSON form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Decode the typed stage spec for this job.
    pub fn spec(&self) -> ModelResult<JobSpec> {
        JobSpec::decode(self.job_type, self.payload.as_ref())
    }
}
