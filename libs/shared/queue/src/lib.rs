pub mod broker;
pub mod error;
pub mod job_queue;
pub mod memory;
pub mod redis_queue;

pub use broker::QueueBroker;
pub use error::QueueError;
pub use job_queue::{DeadLetter, JobQueue, QueueNames, QueueStats};
pub use memory::InMemoryBroker;
pub use redis_queue::RedisQueueService;
