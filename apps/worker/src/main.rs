use std::sync::Arc;

use anyhow::{bail, Context};
use dotenv::dotenv;
use tokio::sync::watch;
use tracing::info;

use check_cell::{AlertTargets, CheckWorkerService, WorkerConfig};
use shared_config::AppConfig;
use shared_database::SupabaseStore;
use shared_queue::{JobQueue, QueueNames, RedisQueueService};
use shared_utils::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();
    init_tracing("worker");

    info!("Starting uptime check worker");
    let config = AppConfig::from_env();

    if !config.is_database_configured() {
        bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY are required to record check results");
    }

    // Every pipeline holds one connection while blocked on BRPOP.
    let broker = RedisQueueService::new(&config, config.worker_concurrency + 2)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
    let queue = Arc::new(JobQueue::new(
        Arc::new(broker),
        QueueNames::with_prefix(&config.queue_prefix),
    ));

    let worker = Arc::new(CheckWorkerService::new(
        WorkerConfig::from_app_config(&config),
        queue.clone(),
        Arc::new(SupabaseStore::new(&config)),
        AlertTargets::from_app_config(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    queue.close().await;
    info!("Worker exited");
    Ok(())
}
