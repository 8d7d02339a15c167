use serde::{Deserialize, Serialize};

use crate::types::{ConnectionStatus, SetupState, SyncGateState};

/// Composite bootstrap state the root view is projected from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapSnapshot {
    /// First-run setup resolution.
    pub setup: SetupState,
    /// Whether persisted settings finished loading.
    pub settings_loaded: bool,
    /// Connection status.
    pub connection: ConnectionStatus,
    /// Sync gate state for the current connection.
    pub sync: SyncGateState,
}

impl Default for BootstrapSnapshot {
    fn default() -> Self {
        Self {
            setup: SetupState::Unknown,
            settings_loaded: false,
            connection: ConnectionStatus::Disconnected,
            sync: SyncGateState::Checking,
        }
    }
}

/// Top-level view surface selected during bootstrap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RootView {
    /// Startup indicator while setup and settings resolve.
    Loading,
    /// First-run setup flow.
    Setup,
    /// Full-screen sync progress for a connected, unsynced session.
    SyncProgress,
    /// Main application surface.
    Main {
        /// Whether a server session is established; `false` renders the
        /// low-emphasis disconnected indicator.
        connected: bool,
    },
}

/// Select the root view for a bootstrap snapshot.
///
/// Pure projection; every reachable state combination resolves to a defined
/// surface.
pub fn select_root_view(snapshot: &BootstrapSnapshot) -> RootView {
    if snapshot.setup == SetupState::Unknown || !snapshot.settings_loaded {
        return RootView::Loading;
    }
    if snapshot.setup == SetupState::Incomplete {
        return RootView::Setup;
    }
    if snapshot.connection == ConnectionStatus::Connected
        && snapshot.sync != SyncGateState::Synced
    {
        return RootView::SyncProgress;
    }

    RootView::Main {
        connected: snapshot.connection == ConnectionStatus::Connected,
    }
}
