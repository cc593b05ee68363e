//! Database error types.

use thiserror::Error;
use vatom_models::ModelError;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid stored value: {0}")]
    Model(#[from] ModelError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Check if the engine reported `SQLITE_BUSY` or `SQLITE_LOCKED`.
    pub fn is_busy(&self) -> bool {
        let DbError::Sqlx(err) = self else {
            return false;
        };

        if let sqlx::Error::Database(db_err) = err {
            if matches!(db_err.code().as_deref(), Some("5") | Some("6")) {
                return true;
            }
            return mentions_lock(db_err.message());
        }

        mentions_lock(&err.to_string())
    }
}

fn mentions_lock(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("database is locked") || message.contains("database is busy")
}
