//! Backup, pull and verify transaction for a single image.
//!
//! ```text
//! Inspecting ─┬─ digests equal ──────────────────────────────────── InSync
//!             └─ digests differ ─ BackingUp? ─ Pulling ─ Cleanup ─ Verifying ─ Refreshed
//! ```
//!
//! The backup tag is only created when a previous image exists. Verification
//! compares the freshly pulled local digest with the remote digest fetched
//! while inspecting; a mismatch is [`ResyncError::RefreshFailed`]. In dry-run
//! mode the store is never mutated and nothing is verified.

use crate::digest::compare_digests;
use crate::error::{Result, ResyncError};
use crate::format::pretty_bytes;
use crate::reference::ImageIdentity;
use crate::registry::DigestSource;
use crate::scheduler::ItemLog;
use crate::stats::RunStats;
use crate::store::{DigestRecord, ImageStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};


/// Default tag a previous image is kept under while its replacement is pulled.
pub const DEFAULT_BACKUP_TAG: &str = "backup";

/// Options shared by every transaction of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Report what would change without touching the local store
    pub dry_run: bool,
    /// Tag the previous image is kept under during the pull
    pub backup_tag: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_tag: DEFAULT_BACKUP_TAG.to_string(),
        }
    }
}

/// Terminal state of a successful transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    InSync,
    Refreshed,
    /// Out of sync, but nothing was changed
    DryRun,
}

/// Result of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub state: SyncState,
    pub stats: RunStats,
    /// The local image after the transaction, if one exists
    pub record: Option<DigestRecord>,
}

/// Reconciles one local image with its registry.
pub struct SyncTransaction<'a> {
    store: &'a dyn ImageStore,
    remote: &'a dyn DigestSource,
    options: &'a SyncOptions,
}

impl<'a> SyncTransaction<'a> {
    pub fn new(store: &'a dyn ImageStore, remote: &'a dyn DigestSource, options: &'a SyncOptions) -> Self {
        Self {
            store,
            remote,
            options,
        }
    }

    /// Runs the transaction for `image`, writing progress to `log`.
    ///
    /// # Errors
    ///
    /// Any registry or local store failure aborts the transaction, except the
    /// removal of the backup tag, which is only reported. A pull failure
    /// leaves the backup tag in place and names it in the error.
    pub async fn run(&self, image: &ImageIdentity, log: &mut ItemLog) -> Result<SyncOutcome> {
        let reference = image.to_string();

        let remote_digest = self.remote.remote_digest(image).await?;
        let current = self.store.inspect(image).await?;
        let local_digest = current.as_ref().map_or("", |r| r.local_digest());
        debug!(%reference, %remote_digest, %local_digest, "comparing digests");

        if compare_digests(&remote_digest, local_digest) {
            let steady = current.as_ref().map_or(0, |r| r.size_bytes);
            log.success(format!("In Sync {}", pretty_bytes(steady as i64)));
            return Ok(SyncOutcome {
                state: SyncState::InSync,
                stats: RunStats::steady(steady),
                record: current,
            });
        }

        log.warning("Out of Sync");
        let removed = current.as_ref().map_or(0, |r| r.size_bytes);

        let backup = (removed != 0).then(|| image.with_tag(&self.options.backup_tag));
        if let Some(backup) = &backup {
            log.info(format!("Tagging backup image. {} -> {}", reference, backup));
            if !self.options.dry_run {
                self.store.tag(image, &self.options.backup_tag).await?;
            }
        }

        log.info(format!("Pulling new image. {}", reference));
        if self.options.dry_run {
            if let Some(backup) = &backup {
                log.info(format!("Removing old image. {}", backup));
            }
            log.info(format!(
                "Dry run: removed: {} added: {} delta: {}",
                pretty_bytes(removed as i64),
                pretty_bytes(removed as i64),
                pretty_bytes(0)
            ));
            return Ok(SyncOutcome {
                state: SyncState::DryRun,
                stats: RunStats::refreshed(removed, removed),
                record: current,
            });
        }

        if let Err(e) = self.store.pull(image).await {
            return Err(match &backup {
                Some(backup) => {
                    log.error(format!("Pull failed, previous image kept as {}", backup));
                    ResyncError::local_store_with_source(
                        "pull",
                        &reference,
                        format!("previous image kept as {}", backup),
                        e,
                    )
                }
                None => e,
            });
        }

        if let Some(backup) = &backup {
            log.info(format!("Removing old image. {}", backup));
            if let Err(e) = self.store.remove_tag(backup).await {
                warn!(%reference, backup = %backup, error = %e, "could not remove backup tag");
                log.warning(format!("Could not remove {}: {}", backup, e));
            }
        }

        let updated = self.store.inspect(image).await?;
        let added = updated.as_ref().map_or(0, |r| r.size_bytes);
        let stats = RunStats::refreshed(removed, added);
        log.info(format!(
            "removed: {} added: {} delta: {}",
            pretty_bytes(removed as i64),
            pretty_bytes(added as i64),
            pretty_bytes(stats.delta())
        ));

        let pulled_digest = updated.as_ref().map_or("", |r| r.local_digest());
        if !compare_digests(&remote_digest, pulled_digest) {
            return Err(ResyncError::refresh_failed(reference, remote_digest, pulled_digest));
        }

        info!(%reference, removed, added, "image refreshed");
        Ok(SyncOutcome {
            state: SyncState::Refreshed,
            stats,
            record: updated,
        })
    }
}
