use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Connection status owned by the connection coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No session with the backend's server.
    Disconnected,
    /// A connection attempt is running.
    Connecting,
    /// Server session is established.
    Connected,
    /// A previously connected session degraded.
    Error,
}

/// Capability snapshot describing the remote server, replaced wholesale on
/// each successful (re)connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server software version when reported.
    pub server_version: Option<String>,
    /// Host operating system version when reported.
    pub os_version: Option<String>,
    /// Base API URL used to construct asset URLs.
    pub api_root: Option<String>,
    /// Auth key used to construct asset URLs.
    pub auth_key: Option<String>,
    /// Detected proxy/tunnel service fronting the server, when any.
    pub proxy_service: Option<String>,
    /// Whether the server exposes its extended private API surface.
    pub private_api: bool,
}

/// First-run setup resolution, cached for the process lifetime once known.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SetupState {
    /// Setup completeness has not been checked yet.
    Unknown,
    /// First-run setup finished previously.
    Complete,
    /// First-run setup has not been finished.
    Incomplete,
}

/// Message-backlog synchronization gate state for the current connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncGateState {
    /// Sync status check has not resolved yet.
    Checking,
    /// Backlog was synchronized at least once.
    Synced,
    /// Backlog is not synchronized; an external completion signal is needed.
    NotSynced,
}

/// Ambiguous timestamp value as handed back by the backend.
///
/// Numeric values carry one of two epoch encodings and text values carry a
/// date representation; `normalization` disambiguates them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch-based value (milliseconds, Unix seconds, or platform seconds).
    Number(f64),
    /// Numeric string or textual date.
    Text(String),
}

/// Chat row returned by the backend's chat-list refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPreview {
    /// Stable chat identifier.
    pub guid: String,
    /// Display title when the chat has one.
    pub title: Option<String>,
    /// Participant display names resolved by the backend.
    pub participant_names: Vec<String>,
    /// Text of the latest message, when any.
    pub last_message_text: Option<String>,
    /// Latest message timestamp in raw backend encoding.
    pub last_message_at: Option<RawTimestamp>,
    /// Whether the latest message was sent from this account.
    pub last_message_from_me: bool,
    /// Whether the chat has unread messages.
    pub unread: bool,
}

/// Contact-address → avatar payload map, replaced wholesale per load/sync.
///
/// Keys are indexed under raw, lowercased, and digits-only forms so a lookup
/// matches however the backend spelled the address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvatarMap {
    entries: HashMap<String, String>,
    loaded: bool,
}

impl AvatarMap {
    /// Build a loaded map from backend entries, expanding each address into
    /// its normalized key forms. Raw keys win over derived forms on collision.
    pub fn indexed(raw_entries: HashMap<String, String>) -> Self {
        let mut entries = HashMap::with_capacity(raw_entries.len() * 2);
        for (address, payload) in &raw_entries {
            entries.insert(address.clone(), payload.clone());
        }
        for (address, payload) in &raw_entries {
            let lowered = address.to_lowercase();
            if lowered != *address {
                entries.entry(lowered).or_insert_with(|| payload.clone());
            }
            let digits = address_digits(address);
            if !digits.is_empty() && digits != *address {
                entries.entry(digits).or_insert_with(|| payload.clone());
            }
        }

        Self {
            entries,
            loaded: true,
        }
    }

    /// Look up an avatar, trying the raw address, its lowercased form, and
    /// its digits-only form in that order.
    pub fn lookup(&self, address: &str) -> Option<&str> {
        if let Some(payload) = self.entries.get(address) {
            return Some(payload);
        }
        let lowered = address.to_lowercase();
        if let Some(payload) = self.entries.get(&lowered) {
            return Some(payload);
        }
        let digits = address_digits(address);
        if digits.is_empty() {
            return None;
        }
        self.entries.get(&digits).map(String::as_str)
    }

    /// Whether an initial load finished, successfully or not.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Assert the loaded flag without touching entries.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Number of indexed address keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reduce an address to its digit characters, dropping the leading `+` and
/// all formatting.
pub fn address_digits(address: &str) -> String {
    address.chars().filter(char::is_ascii_digit).collect()
}
