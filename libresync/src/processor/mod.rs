//! Per-item pipelines driven by the scheduler.
//!
//! [`RefreshProcessor`] synchronizes an image and then feeds its layers and
//! history to the run's deduplication analyzer. [`ReportOnlyProcessor`] only
//! inspects local images and never contacts a registry.

use crate::context::RunContext;
use crate::error::{Result, ResyncError};
use crate::format::pretty_bytes;
use crate::reference::ImageIdentity;
use crate::scheduler::{ItemLog, Processor, WorkItem};
use crate::sync::{SyncOptions, SyncOutcome, SyncTransaction};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;


/// Synchronizes each image with its registry.
#[derive(Debug)]
pub struct RefreshProcessor {
    context: Arc<RunContext>,
    options: SyncOptions,
}

impl RefreshProcessor {
    pub fn new(context: Arc<RunContext>, options: SyncOptions) -> Self {
        Self { context, options }
    }
}

#[async_trait]
impl Processor for RefreshProcessor {
    type Output = SyncOutcome;

    async fn process(&self, item: &WorkItem, log: &mut ItemLog) -> Result<SyncOutcome> {
        let image = ImageIdentity::parse(&item.slug)?;
        let store = self.context.store();

        let outcome = SyncTransaction::new(store, self.context.remote(), &self.options)
            .run(&image, log)
            .await?;

        // Absent only after a dry run of a missing image.
        if let Some(record) = &outcome.record {
            let history = store.history(&image).await?;
            self.context
                .record_image(&image.to_string(), &record.root_layers, &history);
        } else {
            debug!(image = %image, "skipping dedup analysis of absent image");
        }

        Ok(outcome)
    }
}

/// Local size of one inspected image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub image: String,
    pub size_bytes: u64,
}

/// Inspects each local image for the deduplication report.
#[derive(Debug)]
pub struct ReportOnlyProcessor {
    context: Arc<RunContext>,
}

impl ReportOnlyProcessor {
    pub fn new(context: Arc<RunContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Processor for ReportOnlyProcessor {
    type Output = ImageSummary;

    async fn process(&self, item: &WorkItem, log: &mut ItemLog) -> Result<ImageSummary> {
        let image = ImageIdentity::parse(&item.slug)?;
        let reference = image.to_string();
        let store = self.context.store();

        let record = store.inspect(&image).await?.ok_or_else(|| {
            ResyncError::local_store("inspect", &reference, "image is not present locally")
        })?;
        let history = store.history(&image).await?;
        self.context
            .record_image(&reference, &record.root_layers, &history);

        log.info(pretty_bytes(record.size_bytes as i64));
        Ok(ImageSummary {
            image: reference,
            size_bytes: record.size_bytes,
        })
    }
}
