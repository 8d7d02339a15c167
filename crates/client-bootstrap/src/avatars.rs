//! Contact avatar cache with a fast local wave and a slower remote wave.

use std::sync::Arc;

use client_core::{AvatarMap, BackendRpc, InFlight, StateCell};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Address → avatar payload cache, replaced wholesale per load.
///
/// Avatars are cosmetic, so failures here fail open: the UI stops waiting
/// and renders without images rather than surfacing an error.
pub struct AvatarCache {
    backend: Arc<dyn BackendRpc>,
    map: StateCell<AvatarMap>,
    local_load: InFlight,
    remote_sync: InFlight,
}

impl AvatarCache {
    pub fn new(backend: Arc<dyn BackendRpc>) -> Self {
        Self {
            backend,
            map: StateCell::new(AvatarMap::default()),
            local_load: InFlight::default(),
            remote_sync: InFlight::default(),
        }
    }

    /// Current map snapshot.
    pub fn snapshot(&self) -> AvatarMap {
        self.map.get()
    }

    /// Subscribe to map replacements.
    pub fn subscribe(&self) -> watch::Receiver<AvatarMap> {
        self.map.subscribe()
    }

    /// Fast wave: read whatever the backend's local store already has.
    ///
    /// A second call while one is outstanding is a no-op. On failure the map
    /// is still marked loaded so the UI stops waiting.
    pub async fn load_local(&self) {
        let Some(_permit) = self.local_load.try_begin() else {
            debug!("local avatar load already in flight");
            return;
        };

        match self.backend.get_all_avatars().await {
            Ok(entries) => {
                let map = AvatarMap::indexed(entries);
                debug!(entry_count = map.len(), "local avatar load finished");
                self.map.replace(map);
            }
            Err(err) => {
                warn!(error = %err, "local avatar load failed; marking loaded without data");
                let mut current = self.map.get();
                current.mark_loaded();
                self.map.replace(current);
            }
        }
    }

    /// Slow wave: pull avatars from the server, then re-read the local store
    /// regardless of the pull's outcome so a partial remote failure does not
    /// discard what the store already has.
    pub async fn sync_remote(&self) {
        let Some(_permit) = self.remote_sync.try_begin() else {
            debug!("remote avatar sync already in flight");
            return;
        };

        match self.backend.sync_avatars().await {
            Ok(count) => info!(avatar_count = count, "remote avatar sync finished"),
            Err(err) => {
                warn!(error = %err, "remote avatar sync failed; re-reading local store anyway");
            }
        }

        match self.backend.get_all_avatars().await {
            Ok(entries) => self.map.replace(AvatarMap::indexed(entries)),
            Err(err) => {
                // Stale-but-present beats empty; leave the map untouched.
                warn!(error = %err, "post-sync avatar read failed; keeping existing snapshot");
            }
        }
    }

    /// Look up an avatar under any of the address's normalized forms.
    pub fn lookup(&self, address: &str) -> Option<String> {
        let map = self.map.get();
        map.lookup(address).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::Ordering};

    use client_core::RpcError;

    use super::*;
    use crate::testutil::StubBackend;

    #[tokio::test]
    async fn local_load_replaces_map_wholesale() {
        let backend = Arc::new(StubBackend::default());
        *backend.avatar_results.lock().expect("stub lock") = vec![Ok(StubBackend::avatar_entries(
            &[("+1 (555) 123-4567", "data:image/jpeg;a")],
        ))];
        let cache = AvatarCache::new(backend);

        cache.load_local().await;

        let map = cache.snapshot();
        assert!(map.is_loaded());
        assert_eq!(cache.lookup("15551234567").as_deref(), Some("data:image/jpeg;a"));
    }

    #[tokio::test]
    async fn failed_local_load_marks_loaded_without_data() {
        let backend = Arc::new(StubBackend::default());
        *backend.avatar_results.lock().expect("stub lock") =
            vec![Err(RpcError::network("unreachable", "connection refused"))];
        let cache = AvatarCache::new(backend);

        cache.load_local().await;

        let map = cache.snapshot();
        assert!(map.is_loaded());
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn overlapping_local_loads_collapse_to_one_backend_call() {
        let backend = Arc::new(StubBackend::default());
        let gate = Arc::new(tokio::sync::Notify::new());
        *backend.avatar_gate.lock().expect("stub lock") = Some(gate.clone());
        let cache = Arc::new(AvatarCache::new(backend.clone()));

        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.load_local().await })
        };
        tokio::task::yield_now().await;

        // Second trigger is dropped while the first is outstanding.
        cache.load_local().await;
        assert_eq!(backend.calls.avatar_get.load(Ordering::SeqCst), 1);

        gate.notify_one();
        first.await.expect("task should finish");
        assert!(cache.snapshot().is_loaded());
        assert_eq!(backend.calls.avatar_get.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_sync_rereads_local_even_after_remote_failure() {
        let backend = Arc::new(StubBackend::default());
        *backend.avatar_sync.lock().expect("stub lock") =
            Err(RpcError::network("unreachable", "connection refused"));
        *backend.avatar_results.lock().expect("stub lock") = vec![Ok(StubBackend::avatar_entries(
            &[("alice@example.org", "data:image/jpeg;a")],
        ))];
        let cache = AvatarCache::new(backend.clone());

        cache.sync_remote().await;

        assert_eq!(backend.calls.avatar_get.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.lookup("alice@example.org").as_deref(),
            Some("data:image/jpeg;a")
        );
    }

    #[tokio::test]
    async fn map_is_untouched_when_remote_sync_and_reread_both_fail() {
        let backend = Arc::new(StubBackend::default());
        *backend.avatar_results.lock().expect("stub lock") = vec![
            Ok(StubBackend::avatar_entries(&[(
                "alice@example.org",
                "data:image/jpeg;a",
            )])),
            Err(RpcError::network("unreachable", "connection refused")),
        ];
        let cache = AvatarCache::new(backend.clone());

        cache.load_local().await;
        assert_eq!(cache.snapshot().len(), 1);

        *backend.avatar_sync.lock().expect("stub lock") =
            Err(RpcError::network("unreachable", "connection refused"));
        cache.sync_remote().await;

        let map = cache.snapshot();
        assert!(map.is_loaded());
        assert_eq!(
            cache.lookup("alice@example.org").as_deref(),
            Some("data:image/jpeg;a")
        );
    }
}
