use super::*;
use crate::error::{Result, ResyncError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct CountingStore {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl SecureStore for CountingStore {
    async fn lookup(&self, service: &str) -> Result<Option<Credential>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ResyncError::secure_store(service, "locked"));
        }
        match service {
            "keychain.example.com" => Ok(Some(Credential::basic("keyuser", "keypass"))),
            _ => Ok(None),
        }
    }
}

fn static_credentials() -> StaticCredentials {
    StaticCredentials::from_json_str(r#"{"auths":{"registry.docker.io":{"auth":"dXNlcjpwYXNz"}}}"#)
        .unwrap()
}

#[tokio::test]
async fn test_static_entry_wins_without_consulting_secure_store() {
    let store = Arc::new(CountingStore::default());
    let resolver = CredentialResolver::new(static_credentials(), Some(store.clone() as Arc<dyn SecureStore>));

    let cred = resolver.resolve("registry.docker.io").await.unwrap();
    assert_eq!(cred.account(), "user");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_secure_store_consulted_once_per_service() {
    let store = Arc::new(CountingStore::default());
    let resolver = CredentialResolver::new(StaticCredentials::empty(), Some(store.clone() as Arc<dyn SecureStore>));

    for _ in 0..3 {
        let cred = resolver.resolve("keychain.example.com").await.unwrap();
        assert_eq!(cred.account(), "keyuser");
    }
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_misses_are_cached() {
    let store = Arc::new(CountingStore::default());
    let resolver = CredentialResolver::new(StaticCredentials::empty(), Some(store.clone() as Arc<dyn SecureStore>));

    assert!(resolver.resolve("public.example.com").await.is_none());
    assert!(resolver.resolve("public.example.com").await.is_none());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.cached_services(), 1);
}

#[tokio::test]
async fn test_secure_store_failure_downgrades_to_none() {
    let store = Arc::new(CountingStore {
        fail: true,
        ..Default::default()
    });
    let resolver = CredentialResolver::new(StaticCredentials::empty(), Some(store.clone() as Arc<dyn SecureStore>));

    assert!(resolver.resolve("keychain.example.com").await.is_none());
    assert!(resolver.resolve("keychain.example.com").await.is_none());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_anonymous_resolver_finds_nothing() {
    let resolver = CredentialResolver::anonymous();
    assert!(resolver.resolve("registry.docker.io").await.is_none());
}
