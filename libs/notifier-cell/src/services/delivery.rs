use std::sync::Arc;

use tracing::warn;

use shared_database::DeliveryLogStore;
use shared_models::{AlertEvent, DeliveryLog};

/// Append-only delivery trail. Write failures are logged and dropped so
/// they never interrupt delivery.
pub struct DeliveryLogService {
    store: Arc<dyn DeliveryLogStore>,
}

impl DeliveryLogService {
    pub fn new(store: Arc<dyn DeliveryLogStore>) -> Self {
        Self { store }
    }

    pub async fn record_success(&self, event: &AlertEvent) {
        self.write(DeliveryLog::success(event)).await;
    }

    pub async fn record_failure(&self, event: &AlertEvent, error: &str) {
        self.write(DeliveryLog::failed(event, error)).await;
    }

    async fn write(&self, log: DeliveryLog) {
        if let Err(e) = self.store.insert_delivery_log(&log).await {
            warn!(
                "Failed to write delivery log for alert {} (attempt {}): {}",
                log.alert_id, log.attempt, e
            );
        }
    }
}
