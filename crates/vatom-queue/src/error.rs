//! Queue error types.

use thiserror::Error;
use vatom_db::DbError;
use vatom_models::{JobId, ModelError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The job is no longer `RUNNING` under the caller's claim.
    #[error("Lost ownership of job {0}")]
    LostOwnership(JobId),

    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Invalid job: {0}")]
    Model(#[from] ModelError),
}

impl QueueError {
    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    pub fn is_lost_ownership(&self) -> bool {
        matches!(self, QueueError::LostOwnership(_))
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::Db(DbError::Sqlx(err))
    }
}
