//! SQLite persistence for the Video Atomizer pipeline.
//!
//! This crate provides:
//! - Connection pool setup (WAL, busy timeout, foreign keys) and embedded migrations
//! - Epoch-millisecond time helpers
//! - A retry helper for `SQLITE_BUSY`/`SQLITE_LOCKED`
//! - Row models and repositories for videos, transcript segments, highlights and clip assets
//!
//! The `jobs` table is created here but owned by `vatom-queue`.

pub mod error;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod retry;
pub mod time;

pub use error::{DbError, DbResult};
pub use models::JobRow;
pub use pool::{init_memory_pool, init_pool, run_migrations, DbPool};
pub use repositories::{
    ClipAssetRepository, HighlightRepository, TranscriptRepository, VideoRepository,
};
pub use retry::retry_on_sqlite_busy;
