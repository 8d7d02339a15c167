//! Gate between the "still syncing" and "ready" views.

use std::sync::Arc;

use client_core::{BackendRpc, InFlight, StateCell, SyncGateState};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Answers "has the message backlog been synchronized at least once" for the
/// current connection.
///
/// `NotSynced` is terminal until the external completion signal arrives;
/// there is no polling here.
pub struct SyncGate {
    backend: Arc<dyn BackendRpc>,
    state: StateCell<SyncGateState>,
    check: InFlight,
}

impl SyncGate {
    pub fn new(backend: Arc<dyn BackendRpc>) -> Self {
        Self {
            backend,
            state: StateCell::new(SyncGateState::Checking),
            check: InFlight::default(),
        }
    }

    /// Current gate state.
    pub fn state(&self) -> SyncGateState {
        self.state.get()
    }

    /// Subscribe to gate state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncGateState> {
        self.state.subscribe()
    }

    /// Re-enter `Checking`; called on each new connection.
    pub fn reset(&self) {
        self.state.replace(SyncGateState::Checking);
    }

    /// Resolve the gate by asking the backend.
    ///
    /// Fail-closed: a failed check reads as `NotSynced` so the view decision
    /// this feeds always reaches a defined state.
    pub async fn check(&self) -> SyncGateState {
        let Some(_permit) = self.check.try_begin() else {
            debug!("sync check already in flight");
            return self.state.get();
        };

        let next = match self.backend.check_messages_synced().await {
            Ok(true) => SyncGateState::Synced,
            Ok(false) => SyncGateState::NotSynced,
            Err(err) => {
                warn!(error = %err, "sync check failed; treating backlog as not synced");
                SyncGateState::NotSynced
            }
        };
        self.state.replace(next);
        next
    }

    /// External sync-completion signal from the backend's sync procedure.
    pub fn mark_synced(&self) {
        debug!("external sync completion signal received");
        self.state.replace(SyncGateState::Synced);
    }
}
