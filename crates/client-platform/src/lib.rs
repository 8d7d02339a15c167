//! Credential storage for remembered server connections.
//!
//! The bootstrap orchestrator remembers the auth key of the last connected
//! server so unattended reconnection can run on the next start. Secrets go
//! through the [`CredentialStore`] seam: an OS keyring implementation behind
//! the `os-keyring` feature, and an in-memory implementation for tests and
//! headless use.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    #[error("no credential stored")]
    Missing,
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("credential store backend failure: {0}")]
    Backend(String),
}

/// Keyed secret storage. Accounts are server addresses; services namespace
/// one application install from another.
pub trait CredentialStore: Send + Sync {
    fn store(
        &self,
        service: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError>;

    fn load(&self, service: &str, account: &str) -> Result<String, CredentialStoreError>;

    fn forget(&self, service: &str, account: &str) -> Result<(), CredentialStoreError>;
}

/// Process-local credential store used by tests and the smoke binary.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    secrets: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn store(
        &self,
        service: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| CredentialStoreError::Backend("poisoned lock".to_owned()))?;
        secrets.insert((service.to_owned(), account.to_owned()), secret.to_owned());
        Ok(())
    }

    fn load(&self, service: &str, account: &str) -> Result<String, CredentialStoreError> {
        let secrets = self
            .secrets
            .read()
            .map_err(|_| CredentialStoreError::Backend("poisoned lock".to_owned()))?;
        secrets
            .get(&(service.to_owned(), account.to_owned()))
            .cloned()
            .ok_or(CredentialStoreError::Missing)
    }

    fn forget(&self, service: &str, account: &str) -> Result<(), CredentialStoreError> {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| CredentialStoreError::Backend("poisoned lock".to_owned()))?;
        if secrets
            .remove(&(service.to_owned(), account.to_owned()))
            .is_none()
        {
            return Err(CredentialStoreError::Missing);
        }
        Ok(())
    }
}

/// Credential store backed by the OS keyring.
#[cfg(feature = "os-keyring")]
#[derive(Default, Clone, Copy)]
pub struct OsKeyringCredentialStore;

#[cfg(feature = "os-keyring")]
impl CredentialStore for OsKeyringCredentialStore {
    fn store(
        &self,
        service: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        let entry = keyring::Entry::new(service, account)
            .map_err(|err| CredentialStoreError::Backend(err.to_string()))?;
        entry
            .set_password(secret)
            .map_err(|err| CredentialStoreError::Backend(err.to_string()))
    }

    fn load(&self, service: &str, account: &str) -> Result<String, CredentialStoreError> {
        let entry = keyring::Entry::new(service, account)
            .map_err(|err| CredentialStoreError::Backend(err.to_string()))?;
        entry.get_password().map_err(|err| match err {
            keyring::Error::NoEntry => CredentialStoreError::Missing,
            other => CredentialStoreError::Backend(other.to_string()),
        })
    }

    fn forget(&self, service: &str, account: &str) -> Result<(), CredentialStoreError> {
        let entry = keyring::Entry::new(service, account)
            .map_err(|err| CredentialStoreError::Backend(err.to_string()))?;
        entry.delete_credential().map_err(|err| match err {
            keyring::Error::NoEntry => CredentialStoreError::Missing,
            other => CredentialStoreError::Backend(other.to_string()),
        })
    }
}

/// Store handle pinned to one service name.
///
/// Holds the backing store as a trait object so orchestration code does not
/// carry a store type parameter.
#[derive(Clone)]
pub struct ScopedCredentialStore {
    inner: Arc<dyn CredentialStore>,
    service: String,
}

impl ScopedCredentialStore {
    pub fn new(inner: Arc<dyn CredentialStore>, service: impl Into<String>) -> Self {
        Self {
            inner,
            service: service.into(),
        }
    }

    pub fn store(&self, account: &str, secret: &str) -> Result<(), CredentialStoreError> {
        self.inner.store(&self.service, account, secret)
    }

    pub fn load(&self, account: &str) -> Result<String, CredentialStoreError> {
        self.inner.load(&self.service, account)
    }

    pub fn forget(&self, account: &str) -> Result<(), CredentialStoreError> {
        self.inner.forget(&self.service, account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_roundtrip() {
        let store = InMemoryCredentialStore::default();
        store
            .store("lark", "https://imsg.example.com:1234", "auth-key")
            .expect("store should work");

        let loaded = store
            .load("lark", "https://imsg.example.com:1234")
            .expect("load should work");
        assert_eq!(loaded, "auth-key");

        store
            .forget("lark", "https://imsg.example.com:1234")
            .expect("forget should work");
        assert_eq!(
            store.load("lark", "https://imsg.example.com:1234"),
            Err(CredentialStoreError::Missing)
        );
    }

    #[test]
    fn scoped_store_isolates_services() {
        let base = Arc::new(InMemoryCredentialStore::default());
        let a = ScopedCredentialStore::new(base.clone(), "lark-a");
        let b = ScopedCredentialStore::new(base, "lark-b");

        a.store("https://imsg.example.com", "one").expect("store a");
        b.store("https://imsg.example.com", "two").expect("store b");

        assert_eq!(a.load("https://imsg.example.com").expect("load a"), "one");
        assert_eq!(b.load("https://imsg.example.com").expect("load b"), "two");
    }

    struct UnavailableStore;

    impl CredentialStore for UnavailableStore {
        fn store(
            &self,
            _service: &str,
            _account: &str,
            _secret: &str,
        ) -> Result<(), CredentialStoreError> {
            Err(CredentialStoreError::Unavailable("mock outage".to_owned()))
        }

        fn load(&self, _service: &str, _account: &str) -> Result<String, CredentialStoreError> {
            Err(CredentialStoreError::Unavailable("mock outage".to_owned()))
        }

        fn forget(&self, _service: &str, _account: &str) -> Result<(), CredentialStoreError> {
            Err(CredentialStoreError::Unavailable("mock outage".to_owned()))
        }
    }

    #[test]
    fn outage_propagates_through_scoped_store() {
        let scoped = ScopedCredentialStore::new(Arc::new(UnavailableStore), "lark");
        let err = scoped
            .store("https://imsg.example.com", "auth-key")
            .expect_err("store must fail");
        assert_eq!(err, CredentialStoreError::Unavailable("mock outage".to_owned()));
    }
}
