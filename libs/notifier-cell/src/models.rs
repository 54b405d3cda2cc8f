use std::time::Duration;

use shared_config::AppConfig;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub consumer_id: String,
    pub concurrency: usize,
    /// How often due retries are moved from the delayed set onto `alerts`.
    pub promote_interval: Duration,
    /// Pause after a broker error before popping again.
    pub error_backoff: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            consumer_id: "notifier".to_string(),
            concurrency: 10,
            promote_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl NotifierConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            concurrency: config.notifier_concurrency.max(1),
            ..Self::default()
        }
    }
}

/// What happened to one popped alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Failed; the next attempt is parked for `delay`.
    RetryScheduled { next_attempt: u32, delay: Duration },
    /// Failed on the last allowed attempt (or the retry could not be
    /// scheduled) and was moved to `alerts:dead`.
    DeadLettered { error: String },
    /// Failed and could not be parked anywhere.
    Abandoned { error: String },
}
