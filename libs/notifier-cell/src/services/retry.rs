use std::time::Duration;

use shared_models::AlertEvent;

pub const BACKOFF_BASE_MS: u64 = 5000;

/// Delay before re-delivering an alert whose `attempt` just failed:
/// `2^attempt * 5s`.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(32)))
}

/// The follow-up event and its delay, or `None` once the ceiling is reached.
pub fn next_retry(event: &AlertEvent) -> Option<(AlertEvent, Duration)> {
    if !event.can_retry() {
        return None;
    }
    Some((event.next_attempt(), backoff_delay(event.attempt)))
}
