//! Connection pool setup and migrations.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DbResult;

/// Database connection pool type alias.
pub type DbPool = SqlitePool;

/// How long a connection waits on a locked database before `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a pool on `database_url` with WAL journaling and foreign keys on.
///
/// The database file is created if missing. Migrations are not run; call
/// [`run_migrations`] once at startup.
pub async fn init_pool(database_url: &str, max_connections: u32) -> DbResult<DbPool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;

    info!(max_connections, "Database pool initialized");
    Ok(pool)
}

/// Open a migrated, private in-memory database.
///
/// The pool holds exactly one connection that never expires: every new
/// connection to `sqlite::memory:` would see a fresh, empty database. Callers
/// must not hold a transaction while issuing another query on the pool.
pub async fn init_memory_pool() -> DbResult<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> DbResult<()> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
