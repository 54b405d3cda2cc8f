use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use shared_models::{AlertEvent, MAX_ALERT_ATTEMPTS};
use shared_queue::{JobQueue, QueueError};

use crate::services::delivery::DeliveryLogService;
use crate::services::retry::next_retry;
use crate::{ChannelRegistry, DeliveryOutcome, NotifierConfig};

/// Pulls alert events, dispatches them to their channel, and schedules
/// backed-off retries until the attempt ceiling.
pub struct NotifierConsumerService {
    config: NotifierConfig,
    queue: Arc<JobQueue>,
    channels: ChannelRegistry,
    delivery_log: DeliveryLogService,
}

impl NotifierConsumerService {
    pub fn new(
        config: NotifierConfig,
        queue: Arc<JobQueue>,
        channels: ChannelRegistry,
        delivery_log: DeliveryLogService,
    ) -> Self {
        Self {
            config,
            queue,
            channels,
            delivery_log,
        }
    }

    /// Spawns the consumer pool plus the delayed-retry promoter and waits
    /// for them to stop.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(
            "Notifier {} listening on {} ({} consumers, up to {} attempts per alert)",
            self.config.consumer_id,
            self.queue.names().alerts,
            self.config.concurrency,
            MAX_ALERT_ATTEMPTS
        );

        let mut handles: Vec<_> = (0..self.config.concurrency)
            .map(|i| {
                let consumer = self.clone();
                let shutdown = shutdown.clone();
                let name = format!("{}-{}", self.config.consumer_id, i);
                tokio::spawn(async move { consumer.consumer_loop(name, shutdown).await })
            })
            .collect();

        let promoter = self.clone();
        let promoter_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { promoter.promote_loop(promoter_shutdown).await }));

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Notifier task panicked: {}", e);
            }
        }

        info!("Notifier {} stopped", self.config.consumer_id);
    }

    async fn consumer_loop(&self, consumer_name: String, mut shutdown: watch::Receiver<bool>) {
        debug!("Consumer loop started: {}", consumer_name);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let popped = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                popped = self.queue.pop_alert() => popped,
            };

            match popped {
                Ok(event) => {
                    let outcome = self.process_event(event).await;
                    debug!("Consumer {} handled alert: {:?}", consumer_name, outcome);
                }
                Err(QueueError::Closed) => break,
                Err(QueueError::SerializationError(e)) => {
                    warn!("Consumer {} discarded an unreadable alert: {}", consumer_name, e);
                }
                Err(e) => {
                    error!("Consumer {} failed to dequeue alert: {}", consumer_name, e);
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }

        debug!("Consumer loop ended: {}", consumer_name);
    }

    async fn promote_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.promote_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.queue.promote_due_alerts().await {
                        Ok(0) => {}
                        Ok(moved) => debug!("Promoted {} delayed alerts", moved),
                        Err(QueueError::Closed) => break,
                        Err(e) => warn!("Failed to promote delayed alerts: {}", e),
                    }
                }
            }
        }
    }

    /// Delivers one event and decides what happens next. Never fails; every
    /// path ends in a delivery-log entry.
    #[instrument(
        skip(self, event),
        fields(alert_id = %event.alert_id, channel = %event.channel, attempt = event.attempt)
    )]
    pub async fn process_event(&self, event: AlertEvent) -> DeliveryOutcome {
        let error = match self.channels.deliver(event.channel, &event.target, &event.message).await {
            Ok(()) => {
                info!("Alert {} delivered to {} via {}", event.alert_id, event.target, event.channel);
                self.delivery_log.record_success(&event).await;
                return DeliveryOutcome::Delivered;
            }
            Err(e) => e.to_string(),
        };

        warn!(
            "Alert {} delivery failed (attempt {}/{}): {}",
            event.alert_id, event.attempt, MAX_ALERT_ATTEMPTS, error
        );
        self.delivery_log.record_failure(&event, &error).await;

        let Some((retry, delay)) = next_retry(&event) else {
            error!(
                "Alert {} abandoned after {} attempts: {}",
                event.alert_id, event.attempt, error
            );
            return self.dead_letter(&event, error).await;
        };

        match self.queue.schedule_alert(&retry, delay).await {
            Ok(()) => {
                info!(
                    "Alert {} retry {} scheduled in {}ms",
                    retry.alert_id,
                    retry.attempt,
                    delay.as_millis()
                );
                DeliveryOutcome::RetryScheduled {
                    next_attempt: retry.attempt,
                    delay,
                }
            }
            Err(e) => {
                error!("Failed to schedule retry for alert {}: {}", event.alert_id, e);
                self.dead_letter(&event, format!("{} (retry not scheduled: {})", error, e)).await
            }
        }
    }

    async fn dead_letter(&self, event: &AlertEvent, error: String) -> DeliveryOutcome {
        match self.queue.dead_letter_alert(event, &error).await {
            Ok(()) => DeliveryOutcome::DeadLettered { error },
            Err(e) => {
                error!("Failed to dead-letter alert {}: {}", event.alert_id, e);
                DeliveryOutcome::Abandoned { error }
            }
        }
    }
}
