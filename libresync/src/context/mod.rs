//! Run-scoped shared state.
//!
//! A single [`RunContext`] is built at startup and shared by every work item
//! of a run. It owns the memo maps (endpoint and credential caches inside the
//! registry source) and the deduplication analyzer; nothing is global.

use crate::auth::{AuthClient, CredentialResolver, StaticCredentials, platform_secure_store};
use crate::client::Client;
use crate::config::Config;
use crate::dedup::DedupAnalyzer;
use crate::error::Result;
use crate::registry::{AuthenticatedRegistry, DigestSource, RegistryClient};
use crate::store::{HistoryEntry, ImageStore};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;


/// Shared state of one run.
pub struct RunContext {
    store: Arc<dyn ImageStore>,
    remote: Arc<dyn DigestSource>,
    dedup: Mutex<DedupAnalyzer>,
}

impl RunContext {
    pub fn new(store: Arc<dyn ImageStore>, remote: Arc<dyn DigestSource>) -> Self {
        Self {
            store,
            remote,
            dedup: Mutex::new(DedupAnalyzer::new()),
        }
    }

    /// Builds the registry digest source described by `config`.
    ///
    /// Static credentials come from the docker configuration file; an
    /// unreadable file means no static credentials. The platform secure store
    /// is consulted only when enabled and the docker configuration delegates
    /// to it.
    pub fn registry_source(config: &Config) -> Result<AuthenticatedRegistry> {
        let client = Client::with_config(config.network.client_config())?;

        let static_credentials = config
            .credentials
            .docker_config_path()
            .map(|path| StaticCredentials::load_or_empty(&path))
            .unwrap_or_default();
        let secure_store = (config.credentials.secure_store && static_credentials.uses_keychain())
            .then(platform_secure_store);
        debug!(
            static_credentials = static_credentials.len(),
            secure_store = secure_store.is_some(),
            "credential sources ready"
        );

        let credentials = CredentialResolver::new(static_credentials, secure_store);
        Ok(AuthenticatedRegistry::new(
            AuthClient::new(client.clone(), credentials),
            RegistryClient::new(client),
        ))
    }

    /// Creates a context talking to registries as described by `config`.
    pub fn from_config(config: &Config, store: Arc<dyn ImageStore>) -> Result<Self> {
        let remote = Self::registry_source(config)?;
        Ok(Self::new(store, Arc::new(remote)))
    }

    pub fn store(&self) -> &dyn ImageStore {
        self.store.as_ref()
    }

    pub fn remote(&self) -> &dyn DigestSource {
        self.remote.as_ref()
    }

    fn dedup(&self) -> MutexGuard<'_, DedupAnalyzer> {
        self.dedup.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feeds one image's layers and history to the analyzer.
    pub fn record_image(&self, image: &str, layers: &[String], history: &[HistoryEntry]) {
        self.dedup().accumulate(image, layers, history);
    }

    /// Runs `f` against the analyzer.
    pub fn with_dedup<R>(&self, f: impl FnOnce(&DedupAnalyzer) -> R) -> R {
        f(&*self.dedup())
    }

    /// Returns the analyzer, leaving an empty one for the next run.
    pub fn take_dedup(&self) -> DedupAnalyzer {
        std::mem::take(&mut *self.dedup())
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}
