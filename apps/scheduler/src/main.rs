use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::sync::watch;
use tracing::info;

use scheduler_cell::{MonitorSource, SchedulerConfig, SchedulerError, SchedulerService};
use shared_config::AppConfig;
use shared_database::SupabaseStore;
use shared_queue::{JobQueue, QueueNames, RedisQueueService};
use shared_utils::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();
    init_tracing("scheduler");

    info!("Starting uptime scheduler");
    let config = AppConfig::from_env();

    let broker = RedisQueueService::new(&config, 4)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
    let queue = Arc::new(JobQueue::new(
        Arc::new(broker),
        QueueNames::with_prefix(&config.queue_prefix),
    ));

    let source = if !config.scheduler_static_urls.is_empty() {
        info!("Scheduling from a static pool of {} URLs", config.scheduler_static_urls.len());
        MonitorSource::static_pool(config.scheduler_static_urls.clone())?
    } else if config.is_database_configured() {
        info!("Scheduling active monitors from the persistence store");
        MonitorSource::Store(Arc::new(SupabaseStore::new(&config)))
    } else {
        return Err(SchedulerError::NoMonitorSource.into());
    };

    let scheduler = SchedulerService::new(SchedulerConfig::from_app_config(&config), queue, source);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    info!("Scheduler exited");
    Ok(())
}
