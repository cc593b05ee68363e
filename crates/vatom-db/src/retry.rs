//! Retry helper for contended writes.
//!
//! SQLite serializes writers. A writer that loses the race gets
//! `SQLITE_BUSY`/`SQLITE_LOCKED` once the busy timeout elapses, or
//! immediately when a read transaction cannot be upgraded. Those errors are
//! retried with capped exponential backoff plus jitter; everything else is
//! returned as-is.

use rand::random;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::DbResult;

const MAX_RETRIES: u32 = 10;
const BASE_DELAY_MS: u64 = 10;
const MAX_DELAY_MS: u64 = 1_000;

fn backoff_delay(attempt: u32) -> Duration {
    let capped = BASE_DELAY_MS
        .saturating_mul(1u64 << attempt.min(16))
        .min(MAX_DELAY_MS);
    let jitter = random::<u64>() % (capped / 4 + 1);
    Duration::from_millis((capped + jitter).min(MAX_DELAY_MS))
}

/// Run `op`, retrying while the database reports it is busy or locked.
pub async fn retry_on_sqlite_busy<T, F, Fut>(op_name: &'static str, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_busy() && attempt < MAX_RETRIES => {
                let delay = backoff_delay(attempt);
                debug!(
                    op = op_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "SQLite busy, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_capped() {
        for attempt in 0..MAX_RETRIES {
            assert!(backoff_delay(attempt) <= Duration::from_millis(MAX_DELAY_MS));
        }
        assert!(backoff_delay(0) >= Duration::from_millis(BASE_DELAY_MS));
    }

    #[tokio::test]
    async fn test_non_busy_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = retry_on_sqlite_busy("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DbError::not_found("Video", "v1")) }
        })
        .await;

        assert!(matches!(result, Err(DbError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_returns_value() {
        let value = retry_on_sqlite_busy("test", || async { Ok::<_, DbError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
