//! Local image store contract.
//!
//! The synchronization engine never talks to a container engine directly.
//! Every local operation goes through [`ImageStore`]; [`DockerCli`] drives the
//! `docker` command line and [`MemoryStore`] keeps images in memory.

use crate::error::Result;
use crate::format::unpretty_bytes;
use crate::reference::ImageIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod docker;
mod memory;

pub use docker::DockerCli;
pub use memory::{MemoryStore, StoreCall};


/// Result of inspecting a local image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRecord {
    /// Repository digests, `<full reference>@<digest>`
    pub repo_digests: Vec<String>,
    /// Root filesystem layer digests, oldest first
    pub root_layers: Vec<String>,
    /// Virtual size in bytes
    pub size_bytes: u64,
}

impl DigestRecord {
    /// Returns the authoritative local digest.
    ///
    /// Only the first repo digest is considered; an image without any yields
    /// an empty string, which never compares equal to a remote digest.
    pub fn local_digest(&self) -> &str {
        self.repo_digests.first().map_or("", |d| d.trim())
    }
}

/// One build step of an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub created_by: String,
    pub created_at: String,
    /// Size as reported by the store, hashed verbatim
    pub size: String,
}

impl HistoryEntry {
    pub fn new(
        created_by: impl Into<String>,
        created_at: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            created_by: created_by.into(),
            created_at: created_at.into(),
            size: size.into(),
        }
    }

    /// Returns the reported size in bytes.
    pub fn size_bytes(&self) -> u64 {
        unpretty_bytes(&self.size)
    }
}

/// Local container image store.
///
/// Every failure surfaces as [`crate::error::ResyncError::LocalStore`].
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Inspects a local image; `Ok(None)` when it is not present.
    async fn inspect(&self, image: &ImageIdentity) -> Result<Option<DigestRecord>>;

    /// Pulls `image` from its registry.
    async fn pull(&self, image: &ImageIdentity) -> Result<()>;

    /// Adds `new_tag` to the local image `image`.
    async fn tag(&self, image: &ImageIdentity, new_tag: &str) -> Result<()>;

    /// Removes the tag `image` from the local store.
    async fn remove_tag(&self, image: &ImageIdentity) -> Result<()>;

    /// Returns the build history of `image`, most recent step first.
    async fn history(&self, image: &ImageIdentity) -> Result<Vec<HistoryEntry>>;
}
