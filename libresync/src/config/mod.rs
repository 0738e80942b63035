//! Application configuration.
//!
//! This module manages configuration with sensible defaults, loading from a
//! YAML file layered over [`Config::default`].

use crate::auth::DockerConfig;
use crate::client::ClientConfig;
use crate::error::{Result, ResyncError};
use crate::sync::{DEFAULT_BACKUP_TAG, SyncOptions};
use config::{Config as ConfigRs, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};


/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Config {
    /// Parses a `Config` from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(s, FileFormat::Yaml));
        Self::from_builder(builder, None)
    }

    /// Loads a `Config` from `path`, which must exist.
    ///
    /// With no path, the defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(p) = path {
            builder = builder.add_source(File::from(p).format(FileFormat::Yaml).required(true));
        }
        Self::from_builder(builder, path)
    }

    /// Loads a `Config` from `path` if the file exists, otherwise the defaults.
    pub fn load_optional(path: &Path) -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::from(path).format(FileFormat::Yaml).required(false));
        Self::from_builder(builder, Some(path))
    }

    /// Returns the default configuration file location,
    /// `<config dir>/resync/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("resync").join("config.yaml"))
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = ConfigRs::try_from(&Config::default()).map_err(|e| {
            ResyncError::config_with_source("Failed to serialize default configuration", None, e)
        })?;
        Ok(ConfigRs::builder().add_source(defaults))
    }

    /// Creates a `Config` from a `config::ConfigBuilder`.
    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: Option<&Path>,
    ) -> Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| {
                ResyncError::config_with_source(
                    "Failed to deserialize configuration".to_string(),
                    path.map(|p| p.display().to_string()),
                    e,
                )
            })
    }
}

/// Output formatting settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Output {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub color: ColorChoice,
}

/// Enum for report formats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,

    Json,

    Yaml,
}

/// Enum for color output choices.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,

    Always,

    Never,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    /// Request timeout in seconds
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Retries of transient failures per request
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default)]
    pub proxy: Option<String>,

    /// Registry hosts contacted over plain HTTP
    #[serde(default)]
    pub insecure_registries: Vec<String>,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_network_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
            retries: default_retries(),
            proxy: None,
            insecure_registries: Vec::new(),
        }
    }
}

impl Network {
    /// Returns the HTTP client configuration for these settings.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new()
            .with_timeout(self.timeout)
            .with_max_idle_per_host(self.max_idle_per_host)
            .with_retries(self.retries);
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.clone());
        }
        for host in &self.insecure_registries {
            config = config.with_insecure_registry(host.clone());
        }
        config
    }
}

fn default_network_timeout() -> u64 {
    30
}

fn default_max_idle_per_host() -> usize {
    10
}

fn default_retries() -> u32 {
    2
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    /// Images processed at once; defaults to [`default_concurrency`]
    #[serde(default)]
    pub concurrency: Option<usize>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_backup_tag")]
    pub backup_tag: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: None,
            dry_run: false,
            backup_tag: default_backup_tag(),
        }
    }
}

impl SyncSettings {
    /// Returns the configured concurrency, at least 1.
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(default_concurrency).max(1)
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            backup_tag: self.backup_tag.clone(),
        }
    }
}

fn default_backup_tag() -> String {
    DEFAULT_BACKUP_TAG.to_string()
}

/// Default concurrency: one less than the logical CPU count, at least 1.
pub fn default_concurrency() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Credential settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Docker client configuration file holding static credentials
    #[serde(default)]
    pub docker_config: Option<PathBuf>,

    /// Consult the platform secure store for services without static credentials
    #[serde(default = "default_secure_store")]
    pub secure_store: bool,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            docker_config: None,
            secure_store: default_secure_store(),
        }
    }
}

impl Credentials {
    /// Returns the static credential file to read, if any location is known.
    pub fn docker_config_path(&self) -> Option<PathBuf> {
        self.docker_config.clone().or_else(DockerConfig::default_path)
    }
}

fn default_secure_store() -> bool {
    true
}
