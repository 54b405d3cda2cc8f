use std::time::Duration;

use async_trait::async_trait;

use crate::QueueError;

/// FIFO broker with delayed delivery. Payloads are opaque strings; typed
/// access goes through [`crate::JobQueue`].
#[async_trait]
pub trait QueueBroker: Send + Sync {
    async fn push(&self, queue: &str, payload: String) -> Result<(), QueueError>;

    /// Blocks until a payload is available. There is no timeout.
    async fn pop(&self, queue: &str) -> Result<String, QueueError>;

    /// Non-blocking pop of up to `max` of the oldest payloads.
    async fn drain(&self, queue: &str, max: usize) -> Result<Vec<String>, QueueError>;

    /// Parks a payload until `delay` has elapsed; it becomes visible on
    /// `queue` once [`QueueBroker::promote_delayed`] runs after that point.
    async fn push_delayed(&self, queue: &str, payload: String, delay: Duration) -> Result<(), QueueError>;

    /// Moves every due delayed payload onto `queue`. Returns how many moved.
    async fn promote_delayed(&self, queue: &str) -> Result<usize, QueueError>;

    async fn len(&self, queue: &str) -> Result<u64, QueueError>;

    async fn close(&self);
}

pub(crate) fn delayed_key(queue: &str) -> String {
    format!("{}:delayed", queue)
}
