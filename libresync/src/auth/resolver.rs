//! Per-service credential resolution with a run-lifetime cache.

use crate::auth::Credential;
use crate::auth::store::{SecureStore, StaticCredentials};
use crate::memo::SingleFlight;
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

/// Resolves Basic credentials for registry token services.
///
/// The static credential map is consulted first; the secure store only for
/// services without a static entry. Every outcome, including "not found" and
/// secure store failures, is cached per service so each service costs at most
/// one lookup per run. Missing credentials are expected for public images and
/// never fail a synchronization.
#[derive(Debug)]
pub struct CredentialResolver {
    static_credentials: StaticCredentials,
    secure_store: Option<Arc<dyn SecureStore>>,
    cache: SingleFlight<Option<Credential>>,
}

impl CredentialResolver {
    /// Creates a resolver over static credentials and an optional secure store.
    pub fn new(static_credentials: StaticCredentials, secure_store: Option<Arc<dyn SecureStore>>) -> Self {
        Self {
            static_credentials,
            secure_store,
            cache: SingleFlight::new(),
        }
    }

    /// Creates a resolver that never finds credentials.
    pub fn anonymous() -> Self {
        Self::new(StaticCredentials::empty(), None)
    }

    /// Returns the credential for `service`, if any source knows one.
    pub async fn resolve(&self, service: &str) -> Option<Credential> {
        self.cache
            .get_or_init(service, || self.lookup(service))
            .await
    }

    async fn lookup(&self, service: &str) -> Option<Credential> {
        if let Some(credential) = self.static_credentials.get(service) {
            debug!(%service, account = credential.account(), "using static credential");
            return Some(credential);
        }

        let store = self.secure_store.as_ref()?;
        match store.lookup(service).await {
            Ok(Some(credential)) => {
                debug!(%service, account = credential.account(), "using secure store credential");
                Some(credential)
            }
            Ok(None) => {
                debug!(%service, "service not found in secure store");
                None
            }
            Err(e) => {
                warn!(%service, error = %e, "secure store lookup failed, continuing without credentials");
                None
            }
        }
    }

    /// Number of services resolved so far, including misses.
    pub fn cached_services(&self) -> usize {
        self.cache.len()
    }
}
