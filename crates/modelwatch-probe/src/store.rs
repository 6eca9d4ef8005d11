//! Probe status storage.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use modelwatch_core::{ModelEndpointId, ProbeStatus};

/// Key-value store holding the latest probe status per endpoint.
///
/// Owned by the host and injected into the prober.
pub trait StatusStore: Send + Sync {
    fn read(&self, id: &ModelEndpointId) -> Option<ProbeStatus>;
    fn write(&self, id: &ModelEndpointId, status: ProbeStatus);
    fn remove(&self, id: &ModelEndpointId);
    fn snapshot(&self) -> HashMap<ModelEndpointId, ProbeStatus>;
}

/// Process-local status store. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    statuses: RwLock<HashMap<ModelEndpointId, ProbeStatus>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for InMemoryStatusStore {
    fn read(&self, id: &ModelEndpointId) -> Option<ProbeStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    fn write(&self, id: &ModelEndpointId, status: ProbeStatus) {
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), status);
    }

    fn remove(&self, id: &ModelEndpointId) {
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn snapshot(&self) -> HashMap<ModelEndpointId, ProbeStatus> {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
