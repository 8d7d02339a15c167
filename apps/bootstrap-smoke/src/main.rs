//! Drives one full bootstrap against a canned in-process backend and prints
//! the view transitions the UI shell would render.

mod logging;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use client_bootstrap::{BootstrapConfig, BootstrapSequencer, UiUpdateCallback};
use client_core::{BackendRpc, ChatPreview, RawTimestamp, RootView, RpcError, ServerInfo};
use client_platform::{InMemoryCredentialStore, ScopedCredentialStore};
use tokio::sync::mpsc;
use tracing::info;

const CREDENTIAL_SERVICE: &str = "dev.larkchat.smoke";
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend stand-in with a fixed, already-synchronized data set.
struct CannedBackend;

#[async_trait]
impl BackendRpc for CannedBackend {
    async fn check_setup_complete(&self) -> Result<bool, RpcError> {
        Ok(true)
    }

    async fn complete_setup(&self) -> Result<(), RpcError> {
        Ok(())
    }

    async fn auto_connect(&self) -> Result<Option<ServerInfo>, RpcError> {
        Ok(Some(self.server_info().await?))
    }

    async fn connect(&self, _address: &str, _credential: &str) -> Result<ServerInfo, RpcError> {
        self.server_info().await
    }

    async fn server_info(&self) -> Result<ServerInfo, RpcError> {
        Ok(ServerInfo {
            server_version: Some("13.2.1".to_owned()),
            os_version: Some("14.1".to_owned()),
            api_root: Some("https://imsg.example.com:1234/api/v1".to_owned()),
            auth_key: Some("smoke-auth-key".to_owned()),
            proxy_service: None,
            private_api: true,
        })
    }

    async fn check_messages_synced(&self) -> Result<bool, RpcError> {
        Ok(true)
    }

    async fn get_all_avatars(&self) -> Result<HashMap<String, String>, RpcError> {
        Ok(HashMap::from([
            (
                "+1 (555) 123-4567".to_owned(),
                "data:image/jpeg;base64,QQ==".to_owned(),
            ),
            (
                "Bob@Example.org".to_owned(),
                "data:image/jpeg;base64,Qg==".to_owned(),
            ),
        ]))
    }

    async fn sync_avatars(&self) -> Result<u32, RpcError> {
        Ok(2)
    }

    async fn refresh_chats(&self, _limit: u32) -> Result<Vec<ChatPreview>, RpcError> {
        // One timestamp per backend encoding, so the printed ordering shows
        // the normalizer at work.
        Ok(vec![
            ChatPreview {
                guid: "chat-platform-seconds".to_owned(),
                title: None,
                participant_names: vec!["Alice Example".to_owned()],
                last_message_text: Some("see you tomorrow".to_owned()),
                last_message_at: Some(RawTimestamp::Number(700_000_000.0)),
                last_message_from_me: false,
                unread: false,
            },
            ChatPreview {
                guid: "chat-unix-seconds".to_owned(),
                title: Some("Family".to_owned()),
                participant_names: vec!["Bob Example".to_owned(), "Carol Example".to_owned()],
                last_message_text: Some("dinner at 7".to_owned()),
                last_message_at: Some(RawTimestamp::Number(1_700_000_000.0)),
                last_message_from_me: true,
                unread: true,
            },
            ChatPreview {
                guid: "chat-epoch-millis".to_owned(),
                title: Some("Work".to_owned()),
                participant_names: vec!["Dana Example".to_owned()],
                last_message_text: Some("shipped".to_owned()),
                last_message_at: Some(RawTimestamp::Text("1704067200000".to_owned())),
                last_message_from_me: false,
                unread: false,
            },
        ])
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    info!("starting bootstrap-smoke");

    let config = match BootstrapConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    let credentials = ScopedCredentialStore::new(
        Arc::new(InMemoryCredentialStore::default()),
        CREDENTIAL_SERVICE,
    );

    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
    let ui_update: UiUpdateCallback = Arc::new(move |snapshot| {
        let _ = snapshot_tx.send(snapshot);
    });

    let sequencer =
        BootstrapSequencer::spawn(config, Arc::new(CannedBackend), credentials, ui_update);

    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    let mut last_view = None;
    loop {
        let snapshot = tokio::select! {
            maybe = snapshot_rx.recv() => match maybe {
                Some(snapshot) => snapshot,
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => {
                eprintln!("bootstrap did not settle within {SETTLE_TIMEOUT:?}");
                std::process::exit(1);
            }
        };

        if last_view != Some(snapshot.view) {
            println!("view: {:?} — {}", snapshot.view, snapshot.status_text);
            last_view = Some(snapshot.view);
        }

        if snapshot.view == (RootView::Main { connected: true }) && !snapshot.chats.is_empty() {
            println!(
                "bootstrap settled: {} chats, {} avatar keys, server v{}",
                snapshot.chats.len(),
                snapshot.avatar_count,
                snapshot.server_version.as_deref().unwrap_or("unknown")
            );
            for row in &snapshot.chats {
                println!(
                    "  {} — {} (at {})",
                    row.title,
                    row.last_message_text.as_deref().unwrap_or(""),
                    row.last_message_ms
                        .map(|ms| ms.to_string())
                        .unwrap_or_else(|| "unknown".to_owned()),
                );
            }
            break;
        }
    }

    sequencer.shutdown();
}
