use thiserror::Error;

use shared_database::DatabaseError;
use shared_queue::QueueError;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Queue operation failed: {0}")]
    QueueError(#[from] QueueError),

    #[error("Monitor lookup failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("No monitor source configured: set SUPABASE_URL or SCHEDULER_STATIC_URLS")]
    NoMonitorSource,
}
