use thiserror::Error;

use shared_models::AlertChannel;
use shared_queue::QueueError;

/// A single delivery attempt failed.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Webhook failed: {status} {reason}")]
    WebhookStatus { status: u16, reason: String },

    #[error("Webhook request failed: {0}")]
    WebhookTransport(#[from] reqwest::Error),

    #[error("No delivery channel registered for {0}")]
    Unsupported(AlertChannel),
}

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Queue operation failed: {0}")]
    QueueError(#[from] QueueError),

    #[error("SMTP transport setup failed: {0}")]
    TransportSetup(String),
}
