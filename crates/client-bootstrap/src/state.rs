//! UI-facing state reducer for the bootstrap orchestrator.

use client_core::{
    AvatarMap, BootstrapSnapshot, ChatPreview, ConnectionStatus, RootView, ServerInfo, SetupState,
    SyncGateState, normalize_timestamp_ms, select_root_view,
};
use tracing::{debug, warn};

/// Chat list row consumed by the UI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRow {
    pub guid: String,
    pub title: String,
    pub last_message_text: Option<String>,
    /// Normalized latest-message instant in epoch milliseconds; `None` when
    /// the backend value was absent or unparseable.
    pub last_message_ms: Option<i64>,
    pub last_message_from_me: bool,
    pub unread: bool,
}

/// Full UI snapshot emitted after state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiSnapshot {
    pub view: RootView,
    pub status_text: String,
    pub error_text: Option<String>,
    pub server_version: Option<String>,
    pub avatars_loaded: bool,
    pub avatar_count: usize,
    pub chats: Vec<ChatRow>,
}

/// Mutable client state fed by bootstrap stage observations.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    bootstrap: BootstrapSnapshot,
    server_info: Option<ServerInfo>,
    avatars: AvatarMap,
    chats: Vec<ChatRow>,
    error_text: Option<String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current immutable snapshot for UI rendering.
    pub fn snapshot(&self) -> UiSnapshot {
        UiSnapshot {
            view: select_root_view(&self.bootstrap),
            status_text: status_label(&self.bootstrap).to_owned(),
            error_text: self.error_text.clone(),
            server_version: self
                .server_info
                .as_ref()
                .and_then(|info| info.server_version.clone()),
            avatars_loaded: self.avatars.is_loaded(),
            avatar_count: self.avatars.len(),
            chats: self.chats.clone(),
        }
    }

    pub fn set_setup(&mut self, setup: SetupState) {
        self.bootstrap.setup = setup;
    }

    pub fn set_settings_loaded(&mut self, loaded: bool) {
        self.bootstrap.settings_loaded = loaded;
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.bootstrap.connection = status;
    }

    pub fn set_sync(&mut self, sync: SyncGateState) {
        self.bootstrap.sync = sync;
    }

    pub fn set_server_info(&mut self, server_info: Option<ServerInfo>) {
        self.server_info = server_info;
    }

    pub fn set_avatars(&mut self, avatars: AvatarMap) {
        self.avatars = avatars;
    }

    /// Set top-level error message shown by the shell.
    pub fn set_error_text(&mut self, text: impl Into<String>) {
        self.error_text = Some(text.into());
    }

    /// Clear the top-level error message.
    pub fn clear_error(&mut self) {
        self.error_text = None;
    }

    /// Replace the chat list, normalizing timestamps and ordering rows
    /// newest-first. Rows without a parseable timestamp sort last.
    pub fn replace_chats(&mut self, previews: Vec<ChatPreview>) {
        let mut rows: Vec<ChatRow> = previews
            .into_iter()
            .map(|preview| {
                let last_message_ms = normalize_timestamp_ms(preview.last_message_at.as_ref());
                if last_message_ms.is_none() && preview.last_message_at.is_some() {
                    warn!(
                        chat_guid = %preview.guid,
                        "unparseable latest-message timestamp; sorting chat last"
                    );
                }
                ChatRow {
                    title: chat_title(&preview),
                    guid: preview.guid,
                    last_message_text: preview.last_message_text,
                    last_message_ms,
                    last_message_from_me: preview.last_message_from_me,
                    unread: preview.unread,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.last_message_ms.cmp(&a.last_message_ms));
        debug!(chat_count = rows.len(), "chat list replaced");
        self.chats = rows;
    }
}

fn chat_title(preview: &ChatPreview) -> String {
    if let Some(title) = &preview.title
        && !title.trim().is_empty()
    {
        return title.clone();
    }
    if !preview.participant_names.is_empty() {
        return preview.participant_names.join(", ");
    }
    preview.guid.clone()
}

fn status_label(bootstrap: &BootstrapSnapshot) -> &'static str {
    match bootstrap.connection {
        ConnectionStatus::Disconnected => "Disconnected",
        ConnectionStatus::Connecting => "Connecting",
        ConnectionStatus::Error => "Connection error",
        ConnectionStatus::Connected => match bootstrap.sync {
            SyncGateState::Checking => "Checking message sync",
            SyncGateState::NotSynced => "Waiting for message sync",
            SyncGateState::Synced => "Connected",
        },
    }
}
