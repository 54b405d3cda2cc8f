use std::sync::Arc;

use anyhow::{bail, Context};
use dotenv::dotenv;
use tokio::sync::watch;
use tracing::{info, warn};

use notifier_cell::{
    ChannelRegistry, DeliveryLogService, EmailChannel, NotifierConfig, NotifierConsumerService,
    WebhookChannel,
};
use shared_config::AppConfig;
use shared_database::SupabaseStore;
use shared_queue::{JobQueue, QueueNames, RedisQueueService};
use shared_utils::{init_tracing, shutdown_signal};

const REPLAY_BATCH: usize = 1000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();
    init_tracing("notifier");

    info!("Starting uptime notifier");
    let config = AppConfig::from_env();

    if !config.is_database_configured() {
        bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY are required for the delivery log");
    }

    // Consumers block on BRPOP; the promoter and replay need their own.
    let broker = RedisQueueService::new(&config, config.notifier_concurrency + 2)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
    let queue = Arc::new(JobQueue::new(
        Arc::new(broker),
        QueueNames::with_prefix(&config.queue_prefix),
    ));

    let mut channels = ChannelRegistry::new().with(Arc::new(WebhookChannel::default()));
    if config.is_smtp_configured() {
        let email = EmailChannel::from_config(&config).context("Failed to configure email channel")?;
        channels.register(Arc::new(email));
    } else {
        warn!("EMAIL_USER/EMAIL_PASS not set; email alerts will fail and retry");
    }

    if config.notifier_replay_dead_letters {
        let replayed = queue
            .replay_dead_alerts(REPLAY_BATCH)
            .await
            .context("Failed to replay dead-lettered alerts")?;
        info!("Replayed {} dead-lettered alerts", replayed);
    }

    let consumer = Arc::new(NotifierConsumerService::new(
        NotifierConfig::from_app_config(&config),
        queue.clone(),
        channels,
        DeliveryLogService::new(Arc::new(SupabaseStore::new(&config))),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    consumer.run(shutdown_rx).await;
    queue.close().await;
    info!("Notifier exited");
    Ok(())
}
