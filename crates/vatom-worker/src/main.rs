//! Continuous pipeline worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use vatom_worker::bootstrap::executor_from_env;
use vatom_worker::logging::init_tracing;
use vatom_worker::{metrics, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vatom-worker");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => match metrics::init_metrics(addr) {
                Ok(()) => info!(%addr, "Prometheus metrics enabled"),
                Err(e) => error!("Failed to start metrics exporter: {}", e),
            },
            Err(e) => error!("Invalid METRICS_ADDR '{}': {}", addr, e),
        }
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let executor = match executor_from_env(config).await {
        Ok(e) => Arc::new(e),
        Err(e) => {
            error!("Failed to create job executor: {}", e);
            std::process::exit(1);
        }
    };

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current job");
            signal_executor.shutdown();
        }
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
