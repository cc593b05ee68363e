//! Wiring of store, queue and collaborators from the environment.

use std::sync::Arc;

use tracing::info;
use vatom_db::{init_pool, run_migrations, DbPool};
use vatom_llm::OllamaClient;
use vatom_media::{FfmpegRunner, FfmpegTranscoder};
use vatom_queue::{JobQueue, QueueConfig};
use vatom_storage::SourceResolver;

use crate::config::{DatabaseConfig, WorkerConfig};
use crate::dispatcher::JobExecutor;
use crate::error::WorkerResult;
use crate::handlers::StageContext;

/// Open the shared store and apply migrations.
pub async fn connect(config: &DatabaseConfig) -> WorkerResult<DbPool> {
    let pool = init_pool(&config.url, config.max_connections).await?;
    run_migrations(&pool).await?;
    info!(url = %config.url, "Connected to job store");
    Ok(pool)
}

/// Build an executor with the Ollama client and the FFmpeg transcoder.
pub async fn executor_from_env(config: WorkerConfig) -> WorkerResult<JobExecutor> {
    let pool = connect(&DatabaseConfig::from_env()).await?;
    let queue = JobQueue::new(pool.clone(), QueueConfig::from_env());

    let generator = Arc::new(OllamaClient::from_env()?);
    info!(model = generator.model(), "Using Ollama text generator");

    let mut runner = FfmpegRunner::new(&config.ffmpeg_path);
    if let Some(timeout) = config.ffmpeg_timeout {
        runner = runner.with_timeout(timeout);
    }
    let transcoder = Arc::new(FfmpegTranscoder::new(runner));
    let stages = StageContext::new(
        pool,
        SourceResolver::new()?,
        generator,
        transcoder,
        config.output_dir.clone(),
    );

    Ok(JobExecutor::new(config, queue, stages))
}
