//! Shared data models for the Video Atomizer pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Pipeline jobs, their stages and statuses
//! - Typed per-stage job payloads
//! - Videos and their derived records (transcript segments, highlights, clip assets)
//! - Millisecond timestamp formatting

pub mod clip;
pub mod error;
pub mod highlight;
pub mod job;
pub mod timestamp;
pub mod transcript;
pub mod video;

// Re-export common types
pub use clip::{ClipAsset, Orientation};
pub use error::{ModelError, ModelResult};
pub use highlight::{Highlight, HighlightCandidate};
pub use job::{IngestPayload, Job, JobId, JobSpec, JobStatus, JobType};
pub use timestamp::ms_to_timestamp;
pub use transcript::TranscriptSegment;
pub use video::{Video, VideoId, PENDING_SOURCE};
