//! Run one bounded batch and print the report as JSON.

use vatom_worker::bootstrap::executor_from_env;
use vatom_worker::logging::init_tracing;
use vatom_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    let executor = executor_from_env(WorkerConfig::from_env()).await?;

    let report = executor.run_batch(executor.config().batch_size).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
