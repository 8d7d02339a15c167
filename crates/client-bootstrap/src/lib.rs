//! Bootstrap and synchronization orchestrator for the Lark client.
//!
//! Sequences application startup against the local backend process:
//! setup check, credential-based reconnection, sync-status verification,
//! staged avatar population, and the chat-list refresh that follows it.

/// Contact avatar cache with two-wave loading.
pub mod avatars;
/// Env-backed runtime configuration.
pub mod config;
/// Connection coordinator (status, server info, reconnection).
pub mod connection;
/// Bootstrap sequencer driving the stages.
pub mod sequencer;
/// Persisted connection settings.
pub mod settings;
/// UI state reducer and snapshots.
pub mod state;
/// Message-backlog sync gate.
pub mod sync_gate;

#[cfg(test)]
mod testutil;

pub use avatars::AvatarCache;
pub use config::{BootstrapConfig, ConfigError};
pub use connection::{ConnectionCoordinator, RememberedCredential, normalize_server_address};
pub use sequencer::{BootstrapSequencer, UiUpdateCallback};
pub use settings::{ConnectionSettings, clear_settings, load_settings, save_settings};
pub use state::{ChatRow, ClientState, UiSnapshot};
pub use sync_gate::SyncGate;
