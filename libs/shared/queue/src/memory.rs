use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{QueueBroker, QueueError};

struct DelayedEntry {
    due: Instant,
    delay: Duration,
    payload: String,
}

#[derive(Default)]
struct MemoryQueues {
    lists: HashMap<String, VecDeque<String>>,
    delayed: HashMap<String, Vec<DelayedEntry>>,
}

/// Process-local broker with the same FIFO and delayed-delivery semantics
/// as the Redis implementation.
pub struct InMemoryBroker {
    queues: Mutex<MemoryQueues>,
    available: Notify,
    closed: AtomicBool,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(MemoryQueues::default()),
            available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn with_queues<R>(&self, f: impl FnOnce(&mut MemoryQueues) -> R) -> R {
        let mut guard = match self.queues.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn try_pop(&self, queue: &str) -> Option<String> {
        self.with_queues(|queues| queues.lists.get_mut(queue).and_then(VecDeque::pop_back))
    }

    /// Payloads currently visible on `queue`, oldest first.
    pub fn snapshot(&self, queue: &str) -> Vec<String> {
        self.with_queues(|queues| {
            queues.lists
                .get(queue)
                .map(|list| list.iter().rev().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Delays requested for the payloads still parked behind `queue`.
    pub fn pending_delays(&self, queue: &str) -> Vec<Duration> {
        self.with_queues(|queues| {
            queues.delayed
                .get(queue)
                .map(|entries| entries.iter().map(|entry| entry.delay).collect())
                .unwrap_or_default()
        })
    }

    /// Makes every parked payload visible regardless of its due time.
    pub fn release_delayed(&self, queue: &str) -> usize {
        let moved = self.with_queues(|queues| {
            let entries = queues.delayed.remove(queue).unwrap_or_default();
            let list = queues.lists.entry(queue.to_string()).or_default();
            for entry in &entries {
                list.push_front(entry.payload.clone());
            }
            entries.len()
        });

        if moved > 0 {
            self.available.notify_waiters();
        }
        moved
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    async fn push(&self, queue: &str, payload: String) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        self.with_queues(|queues| {
            queues.lists.entry(queue.to_string()).or_default().push_front(payload);
        });
        self.available.notify_waiters();
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<String, QueueError> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.closed.load(Ordering::SeqCst) {
                return Err(QueueError::Closed);
            }

            if let Some(payload) = self.try_pop(queue) {
                return Ok(payload);
            }

            notified.await;
        }
    }

    async fn drain(&self, queue: &str, max: usize) -> Result<Vec<String>, QueueError> {
        let mut drained = Vec::new();
        while drained.len() < max {
            match self.try_pop(queue) {
                Some(payload) => drained.push(payload),
                None => break,
            }
        }
        Ok(drained)
    }

    async fn push_delayed(&self, queue: &str, payload: String, delay: Duration) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        self.with_queues(|queues| {
            queues.delayed.entry(queue.to_string()).or_default().push(DelayedEntry {
                due: Instant::now() + delay,
                delay,
                payload,
            });
        });
        Ok(())
    }

    async fn promote_delayed(&self, queue: &str) -> Result<usize, QueueError> {
        let now = Instant::now();
        let moved = self.with_queues(|queues| {
            let Some(entries) = queues.delayed.get_mut(queue) else {
                return 0;
            };

            let (due, pending): (Vec<_>, Vec<_>) = entries.drain(..).partition(|entry| entry.due <= now);
            *entries = pending;

            let list = queues.lists.entry(queue.to_string()).or_default();
            for entry in &due {
                list.push_front(entry.payload.clone());
            }
            due.len()
        });

        if moved > 0 {
            self.available.notify_waiters();
        }
        Ok(moved)
    }

    async fn len(&self, queue: &str) -> Result<u64, QueueError> {
        Ok(self.with_queues(|queues| queues.lists.get(queue).map_or(0, |list| list.len() as u64)))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.available.notify_waiters();
    }
}
