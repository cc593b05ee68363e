//! Model conversion errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error("Unknown job status: {0}")]
    UnknownJobStatus(String),

    #[error("Unknown clip orientation: {0}")]
    UnknownOrientation(String),

    #[error("Invalid payload for {job_type}: {message}")]
    InvalidPayload { job_type: String, message: String },
}

impl ModelError {
    pub fn invalid_payload(job_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            job_type: job_type.into(),
            message: message.into(),
        }
    }
}
