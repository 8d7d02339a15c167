//! Connection coordinator: status, server capability snapshot, reconnection.

use std::sync::Arc;

use client_core::{BackendRpc, ConnectionStatus, InFlight, ServerInfo, StateCell};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Locally remembered address + credential pair used as the auto-connect
/// fallback when the backend has no stored credentials of its own.
#[derive(Debug, Clone)]
pub struct RememberedCredential {
    /// Normalized server address.
    pub address: String,
    /// Auth key for that server.
    pub credential: String,
}

/// Owns [`ConnectionStatus`] and the [`ServerInfo`] snapshot.
///
/// Status and server info are the only externally observable mutations.
/// Each operation is a single attempt; retry policy belongs to callers.
pub struct ConnectionCoordinator {
    backend: Arc<dyn BackendRpc>,
    status: StateCell<ConnectionStatus>,
    server_info: StateCell<Option<ServerInfo>>,
    info_error: StateCell<Option<String>>,
    attempt: InFlight,
}

impl ConnectionCoordinator {
    pub fn new(backend: Arc<dyn BackendRpc>) -> Self {
        Self {
            backend,
            status: StateCell::new(ConnectionStatus::Disconnected),
            server_info: StateCell::new(None),
            info_error: StateCell::new(None),
            attempt: InFlight::default(),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Latest server capability snapshot.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.get()
    }

    /// Subscribe to server info replacements.
    pub fn subscribe_server_info(&self) -> watch::Receiver<Option<ServerInfo>> {
        self.server_info.subscribe()
    }

    /// Auxiliary error from the last failed info refresh or degrade signal.
    pub fn info_error(&self) -> Option<String> {
        self.info_error.get()
    }

    /// Establish a session with an explicit address and credential.
    ///
    /// On failure the status ends at `Disconnected` and the failure message
    /// is returned for display; a human initiated this path.
    pub async fn connect(&self, address: &str, credential: &str) -> Result<ServerInfo, String> {
        let address = normalize_server_address(address)?;
        let Some(_permit) = self.attempt.try_begin() else {
            return Err("a connection attempt is already in progress".to_owned());
        };

        info!(address = %address, "connecting to server");
        self.status.replace(ConnectionStatus::Connecting);
        match self.backend.connect(&address, credential).await {
            Ok(server_info) => {
                self.adopt_session(server_info.clone());
                Ok(server_info)
            }
            Err(err) => {
                warn!(address = %address, error = %err, "connect failed");
                self.status.replace(ConnectionStatus::Disconnected);
                Err(err.message)
            }
        }
    }

    /// Attempt unattended reconnection with previously stored credentials.
    ///
    /// Asks the backend first; when it reports no stored credentials, falls
    /// back to the locally remembered pair. Every failure degrades silently
    /// to `Disconnected` — this path runs without a human present.
    pub async fn auto_connect(
        &self,
        remembered: Option<RememberedCredential>,
    ) -> Option<ServerInfo> {
        let Some(_permit) = self.attempt.try_begin() else {
            debug!("auto-connect skipped: connection attempt already in progress");
            return None;
        };

        self.status.replace(ConnectionStatus::Connecting);
        match self.backend.auto_connect().await {
            Ok(Some(server_info)) => {
                info!(
                    version = server_info.server_version.as_deref().unwrap_or("unknown"),
                    "auto-connected with backend-stored credentials"
                );
                self.adopt_session(server_info.clone());
                return Some(server_info);
            }
            Ok(None) => debug!("backend has no stored credentials"),
            Err(err) => warn!(error = %err, "backend auto-connect failed"),
        }

        if let Some(remembered) = remembered {
            match self.backend.connect(&remembered.address, &remembered.credential).await {
                Ok(server_info) => {
                    info!(address = %remembered.address, "auto-connected with remembered credential");
                    self.adopt_session(server_info.clone());
                    return Some(server_info);
                }
                Err(err) => {
                    warn!(address = %remembered.address, error = %err, "remembered-credential connect failed");
                }
            }
        }

        self.status.replace(ConnectionStatus::Disconnected);
        None
    }

    /// Re-fetch the capability snapshot without changing connection status.
    ///
    /// Failure only records an auxiliary error.
    pub async fn refresh_server_info(&self) -> Option<ServerInfo> {
        match self.backend.server_info().await {
            Ok(server_info) => {
                self.server_info.replace(Some(server_info.clone()));
                self.info_error.replace(None);
                Some(server_info)
            }
            Err(err) => {
                warn!(error = %err, "server info refresh failed");
                self.info_error.replace(Some(err.message));
                None
            }
        }
    }

    /// External degrade signal for a connected session that was lost.
    ///
    /// The only producer of `ConnectionStatus::Error`; ignored unless
    /// currently connected.
    pub fn mark_degraded(&self, message: impl Into<String>) {
        if self.status.get() != ConnectionStatus::Connected {
            debug!("ignoring degrade signal while not connected");
            return;
        }
        let message = message.into();
        warn!(message = %message, "connected session degraded");
        self.info_error.replace(Some(message));
        self.status.replace(ConnectionStatus::Error);
    }

    fn adopt_session(&self, server_info: ServerInfo) {
        self.server_info.replace(Some(server_info));
        self.info_error.replace(None);
        self.status.replace(ConnectionStatus::Connected);
    }
}

/// Normalize a user-supplied server address to an http(s) origin.
///
/// Adds the `https` scheme when none is present.
pub fn normalize_server_address(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("server address is required".to_owned());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };

    let parsed =
        Url::parse(&candidate).map_err(|err| format!("invalid server address '{trimmed}': {err}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported server address scheme '{other}'")),
    }
    if parsed.host_str().is_none() {
        return Err(format!("server address '{trimmed}' has no host"));
    }

    Ok(parsed.to_string().trim_end_matches('/').to_owned())
}
