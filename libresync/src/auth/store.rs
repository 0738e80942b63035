//! Credential sources for registry token services.
//!
//! Static credentials come from the Docker client configuration file
//! (`~/.docker/config.json`), whose `auths` entries hold base64
//! `account:password` values keyed by service. When that file names the
//! `osxkeychain` or `desktop` credential store, the macOS keychain acts as the
//! secure store for services without a static entry.

use crate::auth::Credential;
use crate::error::{Result, ResyncError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Keychain label Docker uses for registry credentials.
const DOCKER_CREDENTIALS_LABEL: &str = "Docker Credentials";

/// Exit status of `security` when no matching item exists.
const KEYCHAIN_ITEM_NOT_FOUND: i32 = 44;

/// Relevant subset of the Docker client configuration file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuthEntry>,

    #[serde(default, rename = "credsStore")]
    pub creds_store: Option<String>,
}

/// One `auths` entry of the Docker client configuration file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DockerAuthEntry {
    #[serde(default)]
    pub auth: Option<String>,
}

impl DockerConfig {
    /// Returns the default location of the Docker client configuration file.
    ///
    /// `$DOCKER_CONFIG/config.json` when set, otherwise `~/.docker/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(dir) = env::var("DOCKER_CONFIG") {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
    }
}

/// Credentials loaded once from the Docker client configuration file.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    credentials: HashMap<String, Credential>,
    creds_store: Option<String>,
}

impl StaticCredentials {
    /// Creates an empty credential map.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a Docker client configuration document.
    ///
    /// Entries whose `auth` value is missing or not valid base64 are skipped.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: DockerConfig = serde_json::from_str(s).map_err(|e| {
            ResyncError::config_with_source("Failed to parse docker configuration", None, e)
        })?;
        Ok(Self::from_docker_config(config))
    }

    /// Builds the credential map from a parsed configuration.
    pub fn from_docker_config(config: DockerConfig) -> Self {
        let mut credentials = HashMap::new();
        for (service, entry) in config.auths {
            let Some(auth) = entry.auth else {
                continue;
            };
            match Credential::from_encoded(&auth) {
                Ok(credential) => {
                    credentials.insert(service, credential);
                }
                Err(e) => warn!(%service, error = %e, "skipping unreadable credential"),
            }
        }

        Self {
            credentials,
            creds_store: config.creds_store,
        }
    }

    /// Loads the credential map from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ResyncError::config_with_source(
                "Failed to read docker configuration",
                path.to_str(),
                e,
            )
        })?;
        Self::from_json_str(&contents).map_err(|e| {
            ResyncError::config_with_source(
                "Failed to parse docker configuration",
                path.to_str(),
                e,
            )
        })
    }

    /// Loads the credential map from `path`, falling back to an empty map.
    ///
    /// Public images need no credentials, so an absent or unreadable file
    /// is never fatal.
    pub fn load_or_empty(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no docker configuration found");
            return Self::empty();
        }
        match Self::load(path) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read the docker configuration");
                Self::empty()
            }
        }
    }

    /// Returns the static credential for a token service.
    pub fn get(&self, service: &str) -> Option<Credential> {
        self.credentials.get(service).cloned()
    }

    /// Returns the number of static credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Returns true when no static credential is configured.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Returns the configured `credsStore`, if any.
    pub fn creds_store(&self) -> Option<&str> {
        self.creds_store.as_deref()
    }

    /// Returns true when the configuration delegates to the macOS keychain.
    pub fn uses_keychain(&self) -> bool {
        matches!(self.creds_store(), Some("osxkeychain") | Some("desktop"))
    }
}

/// Platform secure store holding registry credentials.
#[async_trait]
pub trait SecureStore: Send + Sync + fmt::Debug {
    /// Looks up the credential for a token service.
    ///
    /// Returns `Ok(None)` when the store has no entry for the service.
    async fn lookup(&self, service: &str) -> Result<Option<Credential>>;
}

/// Secure store for platforms without one; never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSecureStore;

#[async_trait]
impl SecureStore for UnsupportedSecureStore {
    async fn lookup(&self, service: &str) -> Result<Option<Credential>> {
        debug!(%service, "no secure store on this platform");
        Ok(None)
    }
}

/// macOS keychain access through the `security` tool.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    program: PathBuf,
    label: String,
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/security"),
            label: DOCKER_CREDENTIALS_LABEL.to_string(),
        }
    }
}

impl KeychainStore {
    /// Creates a keychain store using the system `security` binary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses another `security` compatible executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Extracts the account from `security -g` standard output.
    ///
    /// The relevant line reads `    "acct"<blob>="user"`.
    fn parse_account(stdout: &str) -> Option<String> {
        stdout.lines().find_map(|line| {
            let value = line.trim().strip_prefix("\"acct\"<blob>=")?;
            Some(value.trim_matches('"').to_string())
        })
    }

    /// Extracts the password from `security -g` standard error.
    ///
    /// The relevant line reads `password: "secret"`.
    fn parse_password(stderr: &str) -> Option<String> {
        stderr.lines().find_map(|line| {
            let value = line.trim().strip_prefix("password:")?.trim();
            let value = value.strip_prefix('"')?.strip_suffix('"')?;
            Some(value.to_string())
        })
    }
}

#[async_trait]
impl SecureStore for KeychainStore {
    async fn lookup(&self, service: &str) -> Result<Option<Credential>> {
        let output = tokio::process::Command::new(&self.program)
            .args(["find-internet-password", "-l", self.label.as_str(), "-s", service, "-g"])
            .output()
            .await
            .map_err(|e| ResyncError::secure_store(service, format!("failed to start keychain: {}", e)))?;

        if output.status.code() == Some(KEYCHAIN_ITEM_NOT_FOUND) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(ResyncError::secure_store(
                service,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match (Self::parse_account(&stdout), Self::parse_password(&stderr)) {
            (Some(account), Some(password)) => Ok(Some(Credential::basic(account, password))),
            _ => Err(ResyncError::secure_store(
                service,
                "keychain entry has no readable account or password",
            )),
        }
    }
}

/// Returns the secure store for the current platform.
pub fn platform_secure_store() -> Arc<dyn SecureStore> {
    if cfg!(target_os = "macos") {
        Arc::new(KeychainStore::new())
    } else {
        Arc::new(UnsupportedSecureStore)
    }
}
