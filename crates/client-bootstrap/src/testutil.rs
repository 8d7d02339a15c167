//! Scripted backend used by the orchestrator tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use client_core::{BackendRpc, ChatPreview, RawTimestamp, RpcError, ServerInfo};
use tokio::sync::Notify;

pub(crate) fn test_server_info(version: &str) -> ServerInfo {
    ServerInfo {
        server_version: Some(version.to_owned()),
        os_version: Some("14.1".to_owned()),
        api_root: Some("https://imsg.example.com:1234/api/v1".to_owned()),
        auth_key: Some("auth-key".to_owned()),
        proxy_service: None,
        private_api: true,
    }
}

pub(crate) fn chat(guid: &str, title: Option<&str>, last_at: Option<RawTimestamp>) -> ChatPreview {
    ChatPreview {
        guid: guid.to_owned(),
        title: title.map(str::to_owned),
        participant_names: vec!["Alice Example".to_owned()],
        last_message_text: Some("hello".to_owned()),
        last_message_at: last_at,
        last_message_from_me: false,
        unread: false,
    }
}

/// Per-procedure call counters.
#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    pub setup: AtomicUsize,
    pub complete_setup: AtomicUsize,
    pub auto_connect: AtomicUsize,
    pub connect: AtomicUsize,
    pub server_info: AtomicUsize,
    pub synced: AtomicUsize,
    pub avatar_get: AtomicUsize,
    pub avatar_sync: AtomicUsize,
    pub chats: AtomicUsize,
}

/// Backend stub with scripted per-procedure results.
///
/// `avatar_results` is a queue: each `get_all_avatars` call consumes the
/// front entry until one remains, which then repeats. Optional gates hold a
/// call open until notified, for overlap tests.
pub(crate) struct StubBackend {
    pub setup_complete: Mutex<Result<bool, RpcError>>,
    pub auto_connect: Mutex<Result<Option<ServerInfo>, RpcError>>,
    pub connect: Mutex<Result<ServerInfo, RpcError>>,
    pub server_info: Mutex<Result<ServerInfo, RpcError>>,
    pub synced: Mutex<Result<bool, RpcError>>,
    pub avatar_results: Mutex<Vec<Result<HashMap<String, String>, RpcError>>>,
    pub avatar_sync: Mutex<Result<u32, RpcError>>,
    pub chats: Mutex<Result<Vec<ChatPreview>, RpcError>>,
    pub last_connect: Mutex<Option<(String, String)>>,
    pub avatar_gate: Mutex<Option<Arc<Notify>>>,
    pub connect_gate: Mutex<Option<Arc<Notify>>>,
    pub calls: CallCounts,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self {
            setup_complete: Mutex::new(Ok(true)),
            auto_connect: Mutex::new(Ok(None)),
            connect: Mutex::new(Ok(test_server_info("13.2.1"))),
            server_info: Mutex::new(Ok(test_server_info("13.2.1"))),
            synced: Mutex::new(Ok(true)),
            avatar_results: Mutex::new(vec![Ok(HashMap::new())]),
            avatar_sync: Mutex::new(Ok(0)),
            chats: Mutex::new(Ok(Vec::new())),
            last_connect: Mutex::new(None),
            avatar_gate: Mutex::new(None),
            connect_gate: Mutex::new(None),
            calls: CallCounts::default(),
        }
    }
}

impl StubBackend {
    pub(crate) fn avatar_entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }
}

#[async_trait]
impl BackendRpc for StubBackend {
    async fn check_setup_complete(&self) -> Result<bool, RpcError> {
        self.calls.setup.fetch_add(1, Ordering::SeqCst);
        self.setup_complete.lock().expect("stub lock").clone()
    }

    async fn complete_setup(&self) -> Result<(), RpcError> {
        self.calls.complete_setup.fetch_add(1, Ordering::SeqCst);
        *self.setup_complete.lock().expect("stub lock") = Ok(true);
        Ok(())
    }

    async fn auto_connect(&self) -> Result<Option<ServerInfo>, RpcError> {
        self.calls.auto_connect.fetch_add(1, Ordering::SeqCst);
        self.auto_connect.lock().expect("stub lock").clone()
    }

    async fn connect(&self, address: &str, credential: &str) -> Result<ServerInfo, RpcError> {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
        let gate = self.connect_gate.lock().expect("stub lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        *self.last_connect.lock().expect("stub lock") =
            Some((address.to_owned(), credential.to_owned()));
        self.connect.lock().expect("stub lock").clone()
    }

    async fn server_info(&self) -> Result<ServerInfo, RpcError> {
        self.calls.server_info.fetch_add(1, Ordering::SeqCst);
        self.server_info.lock().expect("stub lock").clone()
    }

    async fn check_messages_synced(&self) -> Result<bool, RpcError> {
        self.calls.synced.fetch_add(1, Ordering::SeqCst);
        self.synced.lock().expect("stub lock").clone()
    }

    async fn get_all_avatars(&self) -> Result<HashMap<String, String>, RpcError> {
        self.calls.avatar_get.fetch_add(1, Ordering::SeqCst);
        let gate = self.avatar_gate.lock().expect("stub lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut queue = self.avatar_results.lock().expect("stub lock");
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        }
    }

    async fn sync_avatars(&self) -> Result<u32, RpcError> {
        self.calls.avatar_sync.fetch_add(1, Ordering::SeqCst);
        self.avatar_sync.lock().expect("stub lock").clone()
    }

    async fn refresh_chats(&self, _limit: u32) -> Result<Vec<ChatPreview>, RpcError> {
        self.calls.chats.fetch_add(1, Ordering::SeqCst);
        self.chats.lock().expect("stub lock").clone()
    }
}
