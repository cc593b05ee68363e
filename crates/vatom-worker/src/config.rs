//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite:vatom.db?mode=rwc";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when no job was claimed
    pub poll_interval: Duration,
    /// How far an unmet-dependency job is pushed out
    pub dependency_delay: Duration,
    /// Jobs per bounded batch invocation
    pub batch_size: usize,
    /// Root directory for rendered clips (`<output_dir>/<video_id>/…`)
    pub output_dir: PathBuf,
    /// Age after which a `RUNNING` job is reclaimed; `None` disables reclaim
    pub lease_timeout: Option<Duration>,
    /// Minimum gap between reclaim sweeps in the poll loop
    pub reclaim_interval: Duration,
    /// FFmpeg binary
    pub ffmpeg_path: String,
    /// Kill an FFmpeg process running longer than this; `None` waits forever
    pub ffmpeg_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            dependency_delay: Duration::from_secs(15),
            batch_size: 3,
            output_dir: PathBuf::from("./outputs"),
            lease_timeout: None,
            reclaim_interval: Duration::from_secs(60),
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_timeout: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            dependency_delay: Duration::from_secs(
                std::env::var("WORKER_DEPENDENCY_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
            batch_size: std::env::var("WORKER_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(3),
            output_dir: std::env::var("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./outputs")),
            lease_timeout: std::env::var("WORKER_LEASE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            reclaim_interval: Duration::from_secs(
                std::env::var("WORKER_RECLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffmpeg_timeout: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

/// Shared store connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 8,
        }
    }
}

impl DatabaseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.dependency_delay, Duration::from_secs(15));
        assert_eq!(config.batch_size, 3);
        assert!(config.lease_timeout.is_none());
        assert!(config.ffmpeg_timeout.is_none());

        let db = DatabaseConfig::default();
        assert_eq!(db.url, "sqlite:vatom.db?mode=rwc");
        assert_eq!(db.max_connections, 8);
    }
}
