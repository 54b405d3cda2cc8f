pub mod email;
pub mod webhook;

pub use email::*;
pub use webhook::*;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use shared_models::AlertChannel;

use crate::ChannelError;

/// A side-effecting sender for one kind of alert target.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn channel(&self) -> AlertChannel;

    async fn deliver(&self, target: &str, message: &str) -> Result<(), ChannelError>;
}

#[derive(Default, Clone)]
pub struct ChannelRegistry {
    channels: HashMap<AlertChannel, Arc<dyn DeliveryChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.register(channel);
        self
    }

    pub fn register(&mut self, channel: Arc<dyn DeliveryChannel>) {
        self.channels.insert(channel.channel(), channel);
    }

    pub fn get(&self, channel: AlertChannel) -> Option<&Arc<dyn DeliveryChannel>> {
        self.channels.get(&channel)
    }

    pub async fn deliver(&self, channel: AlertChannel, target: &str, message: &str) -> Result<(), ChannelError> {
        match self.get(channel) {
            Some(sender) => sender.deliver(target, message).await,
            None => Err(ChannelError::Unsupported(channel)),
        }
    }
}
