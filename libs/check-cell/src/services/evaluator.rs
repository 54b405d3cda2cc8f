use std::sync::Arc;

use uuid::Uuid;

use shared_database::MonitorStore;
use shared_models::CheckStatus;

use crate::{CheckError, StateEvaluation};

pub fn compare(previous: Option<CheckStatus>, current: CheckStatus) -> StateEvaluation {
    match previous {
        None => StateEvaluation::NoPrevious,
        Some(previous) if previous == current => StateEvaluation::NoChange,
        Some(_) => StateEvaluation::StateChanged,
    }
}

/// Compares a freshly persisted result with the one recorded before it.
pub struct StateEvaluator {
    store: Arc<dyn MonitorStore>,
}

impl StateEvaluator {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self { store }
    }

    /// Must be called after the new result is persisted: the comparison is
    /// against the second-most-recent row.
    pub async fn evaluate(&self, monitor_id: Uuid, current: CheckStatus) -> Result<StateEvaluation, CheckError> {
        let previous = self.store.previous_check_result(monitor_id).await?;
        Ok(compare(previous.map(|row| row.status), current))
    }
}
