use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::MonitorStore;
use shared_models::{CheckStatus, Incident};

use crate::{CheckError, IncidentAction};

/// One async lock per monitor, created on first use and dropped once no
/// task holds or waits on it.
#[derive(Default)]
pub struct MonitorLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl MonitorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<AsyncMutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub async fn acquire(&self, monitor_id: Uuid) -> MonitorLockGuard<'_> {
        let lock = self.table().entry(monitor_id).or_default().clone();
        MonitorLockGuard {
            locks: self,
            monitor_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of monitors with a live lock.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, monitor_id: Uuid) {
        let mut table = self.table();
        if table.get(&monitor_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            table.remove(&monitor_id);
        }
    }
}

/// Held while a monitor's incident state is being changed.
pub struct MonitorLockGuard<'a> {
    locks: &'a MonitorLocks,
    monitor_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for MonitorLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(self.monitor_id);
    }
}

/// Keeps at most one open incident per monitor. Calls for the same monitor
/// are serialised in-process; across processes the store's own atomic
/// create (unique open-incident constraint) is the guard.
pub struct IncidentManager {
    store: Arc<dyn MonitorStore>,
    locks: MonitorLocks,
}

impl IncidentManager {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self {
            store,
            locks: MonitorLocks::new(),
        }
    }

    pub fn locks(&self) -> &MonitorLocks {
        &self.locks
    }

    #[instrument(skip(self))]
    pub async fn handle(&self, monitor_id: Uuid, status: CheckStatus) -> Result<IncidentAction, CheckError> {
        let _guard = self.locks.acquire(monitor_id).await;
        let active = self.store.active_incident(monitor_id).await?;

        match (status, active) {
            (CheckStatus::Down, Some(open)) => {
                debug!("Incident {} already open for monitor {}", open.id, monitor_id);
                Ok(IncidentAction::NoAction)
            }
            (CheckStatus::Down, None) => {
                let incident = Incident::open(monitor_id, Utc::now());
                match self.store.create_incident(&incident).await? {
                    Some(created) => {
                        info!("Incident {} opened for monitor {}", created.id, monitor_id);
                        Ok(IncidentAction::Created(created))
                    }
                    None => {
                        debug!("Another worker opened the incident for monitor {}", monitor_id);
                        Ok(IncidentAction::NoAction)
                    }
                }
            }
            (CheckStatus::Up, Some(open)) => {
                match self.store.resolve_incident(open.id, Utc::now()).await? {
                    Some(resolved) => {
                        info!("Incident {} resolved for monitor {}", resolved.id, monitor_id);
                        Ok(IncidentAction::Resolved(resolved))
                    }
                    None => Ok(IncidentAction::NoAction),
                }
            }
            (CheckStatus::Up, None) => Ok(IncidentAction::NoAction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_entry_is_dropped_after_release() {
        let locks = Arc::new(MonitorLocks::new());
        let monitor_id = Uuid::new_v4();

        let guard = locks.acquire(monitor_id).await;
        assert_eq!(locks.len(), 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(monitor_id).await;
            })
        };
        tokio::task::yield_now().await;

        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
