use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use shared_models::AlertChannel;

use crate::{ChannelError, DeliveryChannel};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    message: &'a str,
    timestamp: String,
}

/// POSTs `{message, timestamp}` as JSON. Anything but 2xx is a failure.
pub struct WebhookChannel {
    client: Client,
    timeout: Duration,
}

impl Default for WebhookChannel {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl WebhookChannel {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Webhook
    }

    async fn deliver(&self, target: &str, message: &str) -> Result<(), ChannelError> {
        let payload = WebhookPayload {
            message,
            timestamp: Utc::now().to_rfc3339(),
        };

        let response = self.client
            .post(target)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::WebhookStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        debug!("Webhook {} accepted alert ({})", target, status);
        Ok(())
    }
}
