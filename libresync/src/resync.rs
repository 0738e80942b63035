//! High-level API for the Resync library.
//!
//! [`Resync`] wires the local image store, the registry digest source and the
//! scheduler together. It is the recommended entry point for most users.
//!
//! # Examples
//!
//! ```no_run
//! use libresync::{NoProgress, Resync};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resync = Resync::builder().concurrency(4).build()?;
//!
//!     let report = resync
//!         .refresh(vec!["redis:6".to_string()], &mut NoProgress)
//!         .await;
//!     println!("{} images, {} errors", report.total_images, report.errors.len());
//!     Ok(())
//! }
//! ```

use crate::config::Config;
use crate::context::RunContext;
use crate::error::Result;
use crate::processor::{ImageSummary, RefreshProcessor, ReportOnlyProcessor};
use crate::registry::DigestSource;
use crate::scheduler::{ItemFailure, ItemLog, Scheduler, SchedulerObserver, WorkItem};
use crate::stats::{ReportMode, Reporter, RunReport};
use crate::store::{DockerCli, ImageStore};
use crate::sync::{SyncOptions, SyncOutcome};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
#[path = "resync_tests.rs"]
mod tests;

/// Receives per-item progress while a run is under way.
///
/// Calls arrive in completion order, one at a time.
pub trait Progress: Send {
    /// Called once per item with its buffered log and, if it failed, the failure.
    fn item_finished(&mut self, item: &WorkItem, log: &ItemLog, failure: Option<&ItemFailure>);

    /// Called when only `remaining` items are still in flight.
    fn outstanding(&mut self, _remaining: usize) {}
}

/// [`Progress`] that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn item_finished(&mut self, _item: &WorkItem, _log: &ItemLog, _failure: Option<&ItemFailure>) {}
}

/// Feeds scheduler results into a [`Reporter`] and forwards progress.
struct ReportObserver<'a> {
    reporter: Reporter,
    progress: &'a mut dyn Progress,
}

impl<'a> ReportObserver<'a> {
    fn new(mode: ReportMode, progress: &'a mut dyn Progress) -> Self {
        Self {
            reporter: Reporter::new(mode),
            progress,
        }
    }
}

impl SchedulerObserver<SyncOutcome> for ReportObserver<'_> {
    fn fulfilled(&mut self, item: &WorkItem, output: SyncOutcome, log: ItemLog) {
        self.reporter.record_stats(&output.stats);
        self.progress.item_finished(item, &log, None);
    }

    fn failed(&mut self, failure: &ItemFailure, log: ItemLog) {
        self.reporter.record_failure(failure.to_string());
        self.progress.item_finished(&failure.item, &log, Some(failure));
    }

    fn outstanding(&mut self, remaining: usize) {
        self.progress.outstanding(remaining);
    }

    fn complete(&mut self, failures: &[ItemFailure]) {
        info!(failures = failures.len(), "refreshing complete");
    }
}

impl SchedulerObserver<ImageSummary> for ReportObserver<'_> {
    fn fulfilled(&mut self, item: &WorkItem, output: ImageSummary, log: ItemLog) {
        self.reporter.record_image(output.image, output.size_bytes);
        self.progress.item_finished(item, &log, None);
    }

    fn failed(&mut self, failure: &ItemFailure, log: ItemLog) {
        self.reporter.record_failure(failure.to_string());
        self.progress.item_finished(&failure.item, &log, Some(failure));
    }

    fn outstanding(&mut self, remaining: usize) {
        self.progress.outstanding(remaining);
    }

    fn complete(&mut self, failures: &[ItemFailure]) {
        info!(failures = failures.len(), "report complete");
    }
}

/// High-level interface for synchronizing local images with their registries.
///
/// One `Resync` holds the run context: the endpoint and credential memo maps
/// and the deduplication analyzer. Each call to [`Resync::refresh`] or
/// [`Resync::report_only`] drains the analyzer into its report.
///
/// Per-item failures never abort a run; they are collected in
/// [`RunReport::errors`].
#[derive(Debug)]
pub struct Resync {
    context: Arc<RunContext>,
    options: SyncOptions,
    concurrency: usize,
}

impl Resync {
    /// Create a builder for configuration.
    pub fn builder() -> ResyncBuilder {
        ResyncBuilder::new()
    }

    /// Returns the shared run context.
    pub fn context(&self) -> &Arc<RunContext> {
        &self.context
    }

    /// Returns the options every transaction runs with.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Returns the maximum number of images processed at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Synchronizes every image in `slugs` with its registry.
    ///
    /// In dry-run mode nothing is pulled, tagged or removed.
    pub async fn refresh(&self, slugs: Vec<String>, progress: &mut dyn Progress) -> RunReport {
        let mode = if self.options.dry_run {
            ReportMode::DryRun
        } else {
            ReportMode::Refresh
        };
        debug!(images = slugs.len(), concurrency = self.concurrency, ?mode, "starting refresh");

        let processor = Arc::new(RefreshProcessor::new(
            Arc::clone(&self.context),
            self.options.clone(),
        ));
        let mut observer = ReportObserver::new(mode, progress);
        Scheduler::new(self.concurrency)
            .run(slugs, processor, &mut observer)
            .await;

        observer.reporter.finish(&self.context.take_dedup())
    }

    /// Measures every image in `slugs` without contacting any registry.
    pub async fn report_only(&self, slugs: Vec<String>, progress: &mut dyn Progress) -> RunReport {
        debug!(images = slugs.len(), concurrency = self.concurrency, "starting report");

        let processor = Arc::new(ReportOnlyProcessor::new(Arc::clone(&self.context)));
        let mut observer = ReportObserver::new(ReportMode::ReportOnly, progress);
        Scheduler::new(self.concurrency)
            .run(slugs, processor, &mut observer)
            .await;

        observer.reporter.finish(&self.context.take_dedup())
    }
}

/// Builder for [`Resync`].
///
/// Anything not set explicitly comes from the [`Config`], which defaults to
/// [`Config::default`]. The local store defaults to the `docker` CLI and the
/// digest source to the registries themselves.
#[derive(Default)]
pub struct ResyncBuilder {
    config: Option<Config>,
    store: Option<Arc<dyn ImageStore>>,
    remote: Option<Arc<dyn DigestSource>>,
    concurrency: Option<usize>,
    dry_run: Option<bool>,
}

impl ResyncBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use another local image store.
    pub fn with_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use another source of remote digests.
    pub fn with_digest_source(mut self, remote: Arc<dyn DigestSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Override the configured concurrency; 0 is treated as 1.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Override the configured dry-run flag.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    /// Build the `Resync` instance.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be created from the network settings.
    pub fn build(self) -> Result<Resync> {
        let config = self.config.unwrap_or_default();

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(DockerCli::new()) as Arc<dyn ImageStore>);
        let remote = match self.remote {
            Some(remote) => remote,
            None => Arc::new(RunContext::registry_source(&config)?) as Arc<dyn DigestSource>,
        };

        let mut options = config.sync.options();
        if let Some(dry_run) = self.dry_run {
            options.dry_run = dry_run;
        }
        let concurrency = self
            .concurrency
            .unwrap_or_else(|| config.sync.concurrency())
            .max(1);

        Ok(Resync {
            context: Arc::new(RunContext::new(store, remote)),
            options,
            concurrency,
        })
    }
}

impl std::fmt::Debug for ResyncBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResyncBuilder")
            .field("config", &self.config)
            .field("concurrency", &self.concurrency)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
