//! Worker error types.
//!
//! The `Display` text of a handler error is what lands in `jobs.last_error`.

use thiserror::Error;
use vatom_models::VideoId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("No transcript segments found for video {0}")]
    NoTranscript(VideoId),

    #[error("Invalid highlight response: {0}")]
    InvalidHighlights(String),

    #[error("Video {0} has no uploaded source yet")]
    SourcePending(VideoId),

    #[error("One or more clips failed to render ({failed} of {attempted} files)")]
    RenderFailed { failed: usize, attempted: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Db(#[from] vatom_db::DbError),

    #[error(transparent)]
    Queue(#[from] vatom_queue::QueueError),

    #[error(transparent)]
    Model(#[from] vatom_models::ModelError),

    #[error(transparent)]
    Storage(#[from] vatom_storage::StorageError),

    #[error(transparent)]
    Llm(#[from] vatom_llm::LlmError),

    #[error(transparent)]
    Media(#[from] vatom_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_transcript(msg: impl Into<String>) -> Self {
        Self::InvalidTranscript(msg.into())
    }

    pub fn invalid_highlights(msg: impl Into<String>) -> Self {
        Self::InvalidHighlights(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
