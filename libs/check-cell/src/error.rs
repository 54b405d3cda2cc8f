use thiserror::Error;

use shared_database::DatabaseError;
use shared_queue::QueueError;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Queue operation failed: {0}")]
    QueueError(#[from] QueueError),
}
