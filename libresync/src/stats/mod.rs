//! Run statistics and the end-of-run report.

use crate::dedup::{DedupAnalyzer, ReuseStats};
use serde::Serialize;
use std::ops::Add;


/// Byte and refresh counters of one or more synchronizations.
///
/// Merging with [`RunStats::accumulate`] is commutative and associative, so
/// per-item stats can be folded in any completion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub bytes_added: u64,
    pub bytes_removed: u64,
    pub bytes_steady: u64,
    pub images_refreshed: u64,
}

impl RunStats {
    /// Stats of an image that was already in sync.
    pub fn steady(bytes: u64) -> Self {
        Self {
            bytes_steady: bytes,
            ..Self::default()
        }
    }

    /// Stats of a refreshed image.
    pub fn refreshed(bytes_removed: u64, bytes_added: u64) -> Self {
        Self {
            bytes_added,
            bytes_removed,
            images_refreshed: 1,
            ..Self::default()
        }
    }

    pub fn accumulate(&mut self, other: &RunStats) {
        self.bytes_added += other.bytes_added;
        self.bytes_removed += other.bytes_removed;
        self.bytes_steady += other.bytes_steady;
        self.images_refreshed += other.images_refreshed;
    }

    /// Added minus removed bytes; negative when the refresh freed space.
    pub fn delta(&self) -> i64 {
        self.bytes_added as i64 - self.bytes_removed as i64
    }

    /// Virtual disk usage after the run: steady plus added bytes.
    pub fn total_virtual(&self) -> u64 {
        self.bytes_steady + self.bytes_added
    }
}

impl Add for RunStats {
    type Output = RunStats;

    fn add(mut self, other: RunStats) -> RunStats {
        self.accumulate(&other);
        self
    }
}

/// Kind of run a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    Refresh,
    DryRun,
    ReportOnly,
}

/// Per-image row of a report-only run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub image: String,
    pub virtual_bytes: u64,
    /// Bytes of build steps shared with at least one other image
    pub reuse_bytes: u64,
}

/// Deduplication figures of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupSummary {
    pub total_real_bytes: u64,
    pub unique_base_images: usize,
    pub layer_reuse: ReuseStats,
    pub history_reuse: ReuseStats,
}

impl DedupSummary {
    pub fn from_analyzer(analyzer: &DedupAnalyzer) -> Self {
        Self {
            total_real_bytes: analyzer.total_real_bytes(),
            unique_base_images: analyzer.unique_base_images(),
            layer_reuse: analyzer.layer_reuse(),
            history_reuse: analyzer.history_reuse(),
        }
    }
}

/// Final report of a run, rendered by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: ReportMode,
    pub total_images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageReport>,
    pub dedup: DedupSummary,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Collects per-item results into a [`RunReport`].
#[derive(Debug)]
pub struct Reporter {
    mode: ReportMode,
    stats: RunStats,
    images: Vec<ImageReport>,
    errors: Vec<String>,
    total_images: usize,
}

impl Reporter {
    pub fn new(mode: ReportMode) -> Self {
        Self {
            mode,
            stats: RunStats::default(),
            images: Vec::new(),
            errors: Vec::new(),
            total_images: 0,
        }
    }

    pub fn record_stats(&mut self, stats: &RunStats) {
        self.total_images += 1;
        self.stats.accumulate(stats);
    }

    /// Records a report-only row; reuse bytes are filled in by [`Reporter::finish`].
    pub fn record_image(&mut self, image: impl Into<String>, virtual_bytes: u64) {
        self.total_images += 1;
        self.images.push(ImageReport {
            image: image.into(),
            virtual_bytes,
            reuse_bytes: 0,
        });
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.total_images += 1;
        self.errors.push(message.into());
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Builds the report; report-only rows are sorted by image name.
    pub fn finish(mut self, analyzer: &DedupAnalyzer) -> RunReport {
        for row in &mut self.images {
            row.reuse_bytes = analyzer.shared_bytes_for(&row.image);
        }
        self.images.sort_by(|a, b| a.image.cmp(&b.image));

        let stats = match self.mode {
            ReportMode::ReportOnly => None,
            ReportMode::Refresh | ReportMode::DryRun => Some(self.stats),
        };

        RunReport {
            mode: self.mode,
            total_images: self.total_images,
            stats,
            images: self.images,
            dedup: DedupSummary::from_analyzer(analyzer),
            errors: self.errors,
        }
    }
}
