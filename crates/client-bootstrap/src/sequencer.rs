//! Bootstrap sequencer: drives setup check, reconnection, sync gating, and
//! staged avatar/chat population off observed state changes.

use std::sync::{Arc, Mutex};

use client_core::{BackendRpc, ConnectionStatus, InFlight, ServerInfo, SetupState};
use client_platform::{CredentialStoreError, ScopedCredentialStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    avatars::AvatarCache,
    config::BootstrapConfig,
    connection::{ConnectionCoordinator, RememberedCredential, normalize_server_address},
    settings::{self, ConnectionSettings},
    state::{ClientState, UiSnapshot},
    sync_gate::SyncGate,
};

/// Callback used to publish new UI snapshots.
pub type UiUpdateCallback = Arc<dyn Fn(UiSnapshot) + Send + Sync + 'static>;

/// Top-level orchestrator composing the coordinator, sync gate, and avatar
/// cache into the startup pipeline.
///
/// Stages chain on observed completion, never on fixed delays; duplicate
/// triggers collapse through the per-component in-flight guards.
pub struct BootstrapSequencer {
    backend: Arc<dyn BackendRpc>,
    connection: Arc<ConnectionCoordinator>,
    sync_gate: Arc<SyncGate>,
    avatars: Arc<AvatarCache>,
    state: Arc<Mutex<ClientState>>,
    config: BootstrapConfig,
    credentials: ScopedCredentialStore,
    ui_update: UiUpdateCallback,
    chat_refresh: InFlight,
    shutdown: CancellationToken,
}

impl BootstrapSequencer {
    /// Start the bootstrap driver and return the sequencer handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: BootstrapConfig,
        backend: Arc<dyn BackendRpc>,
        credentials: ScopedCredentialStore,
        ui_update: UiUpdateCallback,
    ) -> Arc<Self> {
        info!(
            chat_refresh_limit = config.chat_refresh_limit,
            data_dir = %config.data_dir.display(),
            "spawning bootstrap sequencer"
        );

        let sequencer = Arc::new(Self {
            connection: Arc::new(ConnectionCoordinator::new(Arc::clone(&backend))),
            sync_gate: Arc::new(SyncGate::new(Arc::clone(&backend))),
            avatars: Arc::new(AvatarCache::new(Arc::clone(&backend))),
            backend,
            state: Arc::new(Mutex::new(ClientState::new())),
            config,
            credentials,
            ui_update,
            chat_refresh: InFlight::default(),
            shutdown: CancellationToken::new(),
        });

        sequencer.publish();
        let driver = Arc::clone(&sequencer);
        tokio::spawn(driver.run());

        sequencer
    }

    /// Current UI snapshot.
    pub fn snapshot(&self) -> UiSnapshot {
        self.state
            .lock()
            .expect("client state lock poisoned")
            .snapshot()
    }

    /// Look up an avatar for a contact address.
    pub fn avatar_for(&self, address: &str) -> Option<String> {
        self.avatars.lookup(address)
    }

    /// User-initiated connect; surfaces the failure message for display.
    ///
    /// On success persists the connection settings and, when `remember` is
    /// set, the credential.
    pub async fn connect(
        &self,
        address: &str,
        credential: &str,
        remember: bool,
    ) -> Result<ServerInfo, String> {
        let server_info = self.connection.connect(address, credential).await?;
        let normalized = normalize_server_address(address)?;

        let profile = ConnectionSettings {
            server_address: normalized.clone(),
            remember_credential: remember,
        };
        if let Err(err) = settings::save_settings(&self.config.settings_path(), &profile) {
            warn!(error = %err, "failed persisting connection settings after connect");
        }
        if remember {
            if let Err(err) = self.credentials.store(&normalized, credential) {
                warn!(error = %err, "failed persisting credential after connect");
            }
        } else {
            match self.credentials.forget(&normalized) {
                Ok(()) | Err(CredentialStoreError::Missing) => {}
                Err(err) => warn!(error = %err, "failed clearing remembered credential"),
            }
        }

        Ok(server_info)
    }

    /// User-initiated avatar refresh: remote sync then chat-list refresh.
    pub async fn refresh_avatars(&self) {
        self.avatars.sync_remote().await;
        self.refresh_chat_list().await;
    }

    /// Refresh the chat list from the backend.
    ///
    /// Keeps the previous list when the call fails.
    pub async fn refresh_chat_list(&self) {
        let Some(_permit) = self.chat_refresh.try_begin() else {
            debug!("chat refresh already in flight");
            return;
        };

        match self.backend.refresh_chats(self.config.chat_refresh_limit).await {
            Ok(previews) => {
                {
                    let mut state = self.state.lock().expect("client state lock poisoned");
                    state.replace_chats(previews);
                }
                self.publish();
            }
            Err(err) => {
                warn!(error = %err, "chat refresh failed; keeping previous chat list");
            }
        }
    }

    /// External sync-completion signal from the backend's sync procedure.
    pub fn on_sync_completed(&self) {
        self.sync_gate.mark_synced();
    }

    /// External connection-loss signal for a connected session.
    pub fn on_connection_lost(&self, message: impl Into<String>) {
        self.connection.mark_degraded(message);
    }

    /// Mark first-run setup as finished and cache the resolution.
    pub async fn complete_setup(&self) -> Result<(), String> {
        self.backend
            .complete_setup()
            .await
            .map_err(|err| err.message)?;
        {
            let mut state = self.state.lock().expect("client state lock poisoned");
            state.set_setup(SetupState::Complete);
        }
        self.publish();
        Ok(())
    }

    /// Stop the bootstrap driver.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn run(self: Arc<Self>) {
        debug!("bootstrap driver started");
        let mut status_rx = self.connection.subscribe_status();
        let mut info_rx = self.connection.subscribe_server_info();
        let mut sync_rx = self.sync_gate.subscribe();
        let mut avatars_rx = self.avatars.subscribe();

        // Stage 1: setup check and persisted-settings load resolve together
        // before anything else renders.
        let (setup, stored) = tokio::join!(self.resolve_setup(), self.load_stored_settings());
        {
            let mut state = self.state.lock().expect("client state lock poisoned");
            state.set_setup(setup);
            state.set_settings_loaded(true);
        }
        self.publish();

        // Stage 2: unattended reconnection, only once setup is known complete.
        if setup == SetupState::Complete {
            let remembered = self.remembered_credential(stored.as_ref());
            self.connection.auto_connect(remembered).await;
        } else {
            debug!("setup not complete; waiting for first-run flow");
        }

        // Stages 3-4 trigger off observed state changes.
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("bootstrap driver stopping");
                    break;
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    {
                        let mut state = self.state.lock().expect("client state lock poisoned");
                        state.set_connection(status);
                    }
                    self.publish();
                    if status == ConnectionStatus::Connected {
                        Self::start_connected_stages(&self);
                    }
                }
                changed = info_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let server_info = info_rx.borrow_and_update().clone();
                    {
                        let mut state = self.state.lock().expect("client state lock poisoned");
                        state.set_server_info(server_info);
                    }
                    self.publish();
                }
                changed = sync_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let sync = *sync_rx.borrow_and_update();
                    {
                        let mut state = self.state.lock().expect("client state lock poisoned");
                        state.set_sync(sync);
                    }
                    self.publish();
                }
                changed = avatars_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let avatars = avatars_rx.borrow_and_update().clone();
                    {
                        let mut state = self.state.lock().expect("client state lock poisoned");
                        state.set_avatars(avatars);
                    }
                    self.publish();
                }
            }
        }
    }

    /// Stage 3 (sync check) and stage 4 (avatar waves, then chat refresh),
    /// started on each observed transition into `Connected`.
    fn start_connected_stages(this: &Arc<Self>) {
        this.sync_gate.reset();

        let gate = Arc::clone(&this.sync_gate);
        tokio::spawn(async move {
            gate.check().await;
        });

        let this = Arc::clone(this);
        tokio::spawn(async move {
            this.avatars.load_local().await;
            this.avatars.sync_remote().await;
            // Participant names become resolvable once contacts are linked,
            // so the chat list is recomputed only after the avatar sync.
            this.refresh_chat_list().await;
        });
    }

    async fn resolve_setup(&self) -> SetupState {
        match self.backend.check_setup_complete().await {
            Ok(true) => SetupState::Complete,
            Ok(false) => SetupState::Incomplete,
            Err(err) => {
                warn!(error = %err, "setup check failed; treating setup as incomplete");
                SetupState::Incomplete
            }
        }
    }

    async fn load_stored_settings(&self) -> Option<ConnectionSettings> {
        match settings::load_settings(&self.config.settings_path()) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed loading connection settings; continuing without them");
                None
            }
        }
    }

    fn remembered_credential(
        &self,
        stored: Option<&ConnectionSettings>,
    ) -> Option<RememberedCredential> {
        let stored = stored?;
        if !stored.remember_credential || stored.server_address.trim().is_empty() {
            return None;
        }

        match self.credentials.load(&stored.server_address) {
            Ok(credential) => Some(RememberedCredential {
                address: stored.server_address.clone(),
                credential,
            }),
            Err(CredentialStoreError::Missing) => {
                debug!("no remembered credential for saved server");
                None
            }
            Err(err) => {
                warn!(error = %err, "credential store unavailable; skipping remembered credential");
                None
            }
        }
    }

    fn publish(&self) {
        let snapshot = self
            .state
            .lock()
            .expect("client state lock poisoned")
            .snapshot();
        (self.ui_update)(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::atomic::Ordering,
        time::{Duration, SystemTime, UNIX_EPOCH},
    };

    use client_core::{RawTimestamp, RootView, RpcError};
    use client_platform::InMemoryCredentialStore;

    use super::*;
    use crate::testutil::{StubBackend, chat, test_server_info};

    fn test_config(label: &str) -> BootstrapConfig {
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        BootstrapConfig {
            prefill_server_address: None,
            prefill_credential: None,
            data_dir: env::temp_dir().join(format!("lark-seq-{label}-{now_nanos}")),
            chat_refresh_limit: 50,
        }
    }

    fn spawn_sequencer(
        label: &str,
        backend: Arc<StubBackend>,
        credentials: ScopedCredentialStore,
    ) -> Arc<BootstrapSequencer> {
        BootstrapSequencer::spawn(
            test_config(label),
            backend,
            credentials,
            Arc::new(|_snapshot: UiSnapshot| {}),
        )
    }

    fn in_memory_credentials() -> ScopedCredentialStore {
        ScopedCredentialStore::new(Arc::new(InMemoryCredentialStore::default()), "lark-test")
    }

    async fn wait_until<F>(sequencer: &BootstrapSequencer, predicate: F) -> UiSnapshot
    where
        F: Fn(&UiSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = sequencer.snapshot();
                if predicate(&snapshot) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected snapshot state should be reached")
    }

    #[tokio::test]
    async fn happy_path_reaches_main_view_with_chats_and_avatars() {
        let backend = Arc::new(StubBackend::default());
        *backend.auto_connect.lock().expect("stub lock") = Ok(Some(test_server_info("13.2.1")));
        *backend.avatar_results.lock().expect("stub lock") = vec![Ok(StubBackend::avatar_entries(
            &[("+1 (555) 123-4567", "data:image/jpeg;a")],
        ))];
        *backend.chats.lock().expect("stub lock") = Ok(vec![
            chat("older", Some("Older"), Some(RawTimestamp::Number(700_000_000.0))),
            chat("newer", Some("Newer"), Some(RawTimestamp::Number(1_700_000_000.0))),
        ]);

        let sequencer = spawn_sequencer("happy", backend.clone(), in_memory_credentials());
        let snapshot = wait_until(&sequencer, |snapshot| {
            snapshot.view == RootView::Main { connected: true } && !snapshot.chats.is_empty()
        })
        .await;

        assert_eq!(snapshot.status_text, "Connected");
        assert_eq!(snapshot.server_version.as_deref(), Some("13.2.1"));
        assert!(snapshot.avatars_loaded);
        assert_eq!(snapshot.chats[0].guid, "newer");
        assert_eq!(
            sequencer.avatar_for("15551234567").as_deref(),
            Some("data:image/jpeg;a")
        );

        // Local wave plus the post-sync re-read, then the chained refresh.
        assert_eq!(backend.calls.avatar_get.load(Ordering::SeqCst), 2);
        assert_eq!(backend.calls.avatar_sync.load(Ordering::SeqCst), 1);
        assert_eq!(backend.calls.chats.load(Ordering::SeqCst), 1);
        sequencer.shutdown();
    }

    #[tokio::test]
    async fn incomplete_setup_routes_to_setup_without_connecting() {
        let backend = Arc::new(StubBackend::default());
        *backend.setup_complete.lock().expect("stub lock") = Ok(false);

        let sequencer = spawn_sequencer("setup", backend.clone(), in_memory_credentials());
        let snapshot = wait_until(&sequencer, |snapshot| snapshot.view == RootView::Setup).await;

        assert_eq!(snapshot.view, RootView::Setup);
        assert_eq!(backend.calls.auto_connect.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls.connect.load(Ordering::SeqCst), 0);
        sequencer.shutdown();
    }

    #[tokio::test]
    async fn failed_auto_connect_lands_on_disconnected_main_view() {
        let backend = Arc::new(StubBackend::default());
        *backend.auto_connect.lock().expect("stub lock") =
            Err(RpcError::network("unreachable", "connection refused"));

        let sequencer = spawn_sequencer("autofail", backend, in_memory_credentials());
        let snapshot = wait_until(&sequencer, |snapshot| {
            snapshot.view == RootView::Main { connected: false }
        })
        .await;

        assert_eq!(snapshot.status_text, "Disconnected");
        assert_eq!(snapshot.error_text, None);
        sequencer.shutdown();
    }

    #[tokio::test]
    async fn sync_screen_shows_until_external_completion_signal() {
        let backend = Arc::new(StubBackend::default());
        *backend.auto_connect.lock().expect("stub lock") = Ok(Some(test_server_info("13.2.1")));
        *backend.synced.lock().expect("stub lock") = Ok(false);

        let sequencer = spawn_sequencer("gate", backend, in_memory_credentials());
        let snapshot =
            wait_until(&sequencer, |snapshot| snapshot.view == RootView::SyncProgress).await;
        assert_eq!(snapshot.status_text, "Waiting for message sync");

        sequencer.on_sync_completed();
        wait_until(&sequencer, |snapshot| {
            snapshot.view == RootView::Main { connected: true }
        })
        .await;
        sequencer.shutdown();
    }

    #[tokio::test]
    async fn avatar_map_survives_failed_remote_sync() {
        let backend = Arc::new(StubBackend::default());
        *backend.auto_connect.lock().expect("stub lock") = Ok(Some(test_server_info("13.2.1")));
        *backend.avatar_sync.lock().expect("stub lock") =
            Err(RpcError::network("unreachable", "connection refused"));
        *backend.avatar_results.lock().expect("stub lock") = vec![
            Ok(StubBackend::avatar_entries(&[(
                "alice@example.org",
                "data:image/jpeg;a",
            )])),
            Err(RpcError::network("unreachable", "connection refused")),
        ];

        let sequencer = spawn_sequencer("avatars", backend.clone(), in_memory_credentials());
        let snapshot = wait_until(&sequencer, |snapshot| {
            snapshot.avatars_loaded && backend.calls.avatar_get.load(Ordering::SeqCst) >= 2
        })
        .await;

        assert!(snapshot.avatar_count >= 1);
        assert_eq!(
            sequencer.avatar_for("alice@example.org").as_deref(),
            Some("data:image/jpeg;a")
        );
        sequencer.shutdown();
    }

    #[tokio::test]
    async fn manual_connect_persists_profile_for_later_auto_connect() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let credentials = ScopedCredentialStore::new(store.clone(), "lark-test");
        let config = test_config("persist");

        let backend = Arc::new(StubBackend::default());
        let first = BootstrapSequencer::spawn(
            config.clone(),
            backend.clone(),
            credentials.clone(),
            Arc::new(|_snapshot: UiSnapshot| {}),
        );
        // Let the unattended auto-connect attempt finish first.
        wait_until(&first, |snapshot| {
            snapshot.view == RootView::Main { connected: false }
        })
        .await;
        first
            .connect("imsg.example.com:1234", "auth-key", true)
            .await
            .expect("manual connect should work");
        first.shutdown();

        let stored = settings::load_settings(&config.settings_path())
            .expect("settings should load")
            .expect("settings should be present");
        assert_eq!(stored.server_address, "https://imsg.example.com:1234");
        assert!(stored.remember_credential);

        // A fresh start with no backend-stored credentials reconnects with
        // the remembered pair.
        let restart_backend = Arc::new(StubBackend::default());
        let second = BootstrapSequencer::spawn(
            config,
            restart_backend.clone(),
            credentials,
            Arc::new(|_snapshot: UiSnapshot| {}),
        );
        wait_until(&second, |snapshot| {
            snapshot.view == RootView::Main { connected: true }
        })
        .await;

        let (address, credential) = restart_backend
            .last_connect
            .lock()
            .expect("stub lock")
            .clone()
            .expect("fallback connect should reach backend");
        assert_eq!(address, "https://imsg.example.com:1234");
        assert_eq!(credential, "auth-key");
        second.shutdown();
    }
}
