use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::RpcError,
    types::{ChatPreview, ServerInfo},
};

/// Procedure surface of the local backend process.
///
/// Every call is a single attempt; retry policy belongs to callers. The
/// bootstrap path converts failures into safe default states instead of
/// propagating them.
#[async_trait]
pub trait BackendRpc: Send + Sync {
    /// Whether first-run setup finished previously.
    async fn check_setup_complete(&self) -> Result<bool, RpcError>;

    /// Persist the first-run setup as finished.
    async fn complete_setup(&self) -> Result<(), RpcError>;

    /// Reconnect using credentials the backend stored on a prior connect.
    ///
    /// `None` means no stored credentials were available.
    async fn auto_connect(&self) -> Result<Option<ServerInfo>, RpcError>;

    /// Establish a server session with an explicit address and credential.
    async fn connect(&self, address: &str, credential: &str) -> Result<ServerInfo, RpcError>;

    /// Re-fetch the capability snapshot for the current session.
    async fn server_info(&self) -> Result<ServerInfo, RpcError>;

    /// Whether the message backlog was synchronized at least once.
    async fn check_messages_synced(&self) -> Result<bool, RpcError>;

    /// Read all locally stored contact avatars as address → data URI.
    async fn get_all_avatars(&self) -> Result<HashMap<String, String>, RpcError>;

    /// Pull contact avatars from the server into the backend's local store.
    ///
    /// Returns the number of avatars stored.
    async fn sync_avatars(&self) -> Result<u32, RpcError>;

    /// Refresh the chat list from the server and return previews with
    /// re-resolved participant names.
    async fn refresh_chats(&self, limit: u32) -> Result<Vec<ChatPreview>, RpcError>;
}
