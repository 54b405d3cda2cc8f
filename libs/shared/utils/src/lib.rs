pub mod retry;
pub mod shutdown;
pub mod telemetry;
pub mod test_utils;

pub use retry::{retry_with_linear_backoff, RetryPolicy};
pub use shutdown::shutdown_signal;
pub use telemetry::init_tracing;
