use std::path::Path;

use vatom_media::check_ffmpeg;
use vatom_worker::bootstrap::connect;
use vatom_worker::{DatabaseConfig, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with output_dir={}",
        config.output_dir.display()
    );
    ensure_output_dir(&config.output_dir).await?;

    let ffmpeg = check_ffmpeg(&config.ffmpeg_path)?;
    println!("worker-selfcheck: ffmpeg at {}", ffmpeg.display());

    ensure_env_present(&["OLLAMA_API_KEY"])?;

    let pool = connect(&DatabaseConfig::from_env()).await?;
    sqlx_ping(&pool).await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_output_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

async fn sqlx_ping(pool: &vatom_db::DbPool) -> anyhow::Result<()> {
    let queue = vatom_queue::JobQueue::new(pool.clone(), vatom_queue::QueueConfig::default());
    let counts = queue.counts_by_status().await?;
    println!(
        "worker-selfcheck: jobs queued={} running={} succeeded={} failed={}",
        counts.queued, counts.running, counts.succeeded, counts.failed
    );
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
