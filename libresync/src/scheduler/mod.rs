//! Bounded-concurrency work scheduler.
//!
//! A fixed pool of workers pulls items from a shared queue in input order.
//! Each item runs on its own task, so an error or even a panic in one item is
//! captured as that item's failure and never reaches its siblings. Results
//! are funnelled through a channel to a single observer, which therefore
//! needs no synchronization of its own.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error};

mod log;

pub use log::{ItemLog, LineKind, LogLine};

#[cfg(test)]
mod tests;

/// One queued reference together with its position in the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Zero-based position in the input
    pub index: usize,
    /// Number of items in the run
    pub total: usize,
    /// Reference as given by the user
    pub slug: String,
}

impl WorkItem {
    /// Returns the `[n/total]` label used in progress output.
    pub fn position(&self) -> String {
        format!("[{}/{}]", self.index + 1, self.total)
    }
}

/// A captured per-item failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item: WorkItem,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item.slug, self.message)
    }
}

/// Work performed for each item.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Processes one item, writing user-facing progress to `log`.
    async fn process(&self, item: &WorkItem, log: &mut ItemLog) -> Result<Self::Output>;
}

/// Receives item results, in completion order, on the scheduler's task.
pub trait SchedulerObserver<T> {
    fn fulfilled(&mut self, item: &WorkItem, output: T, log: ItemLog);

    fn failed(&mut self, failure: &ItemFailure, log: ItemLog);

    /// Called when `remaining` items are unresolved and they all fit in the pool.
    fn outstanding(&mut self, _remaining: usize) {}

    /// Called once after every item resolved.
    fn complete(&mut self, failures: &[ItemFailure]);
}

/// Totals of a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
}

struct Completion<T> {
    item: WorkItem,
    result: std::result::Result<T, String>,
    log: ItemLog,
}

/// Drives a [`Processor`] over a list of references with at most
/// `concurrency` items in flight.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    concurrency: usize,
}

impl Scheduler {
    /// Creates a scheduler; a concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `processor` over `slugs`, reporting every result to `observer`.
    pub async fn run<P, O>(&self, slugs: Vec<String>, processor: Arc<P>, observer: &mut O) -> RunSummary
    where
        P: Processor,
        O: SchedulerObserver<P::Output>,
    {
        let total = slugs.len();
        let queue: VecDeque<WorkItem> = slugs
            .into_iter()
            .enumerate()
            .map(|(index, slug)| WorkItem { index, total, slug })
            .collect();
        let queue = Arc::new(Mutex::new(queue));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers = self.concurrency.min(total);
        debug!(total, workers, "starting scheduler");
        for _ in 0..workers {
            tokio::spawn(Self::worker(Arc::clone(&queue), Arc::clone(&processor), tx.clone()));
        }
        drop(tx);

        let mut failures = Vec::new();
        let mut resolved = 0;
        while let Some(completion) = rx.recv().await {
            resolved += 1;
            let Completion { item, result, log } = completion;
            match result {
                Ok(output) => observer.fulfilled(&item, output, log),
                Err(message) => {
                    let failure = ItemFailure { item, message };
                    observer.failed(&failure, log);
                    failures.push(failure);
                }
            }

            let remaining = total - resolved;
            if remaining > 0 && remaining <= self.concurrency {
                observer.outstanding(remaining);
            }
        }

        if resolved < total {
            error!(total, resolved, "workers stopped before every item resolved");
        }

        observer.complete(&failures);
        RunSummary {
            total,
            succeeded: resolved - failures.len(),
            failures,
        }
    }

    async fn worker<P: Processor>(
        queue: Arc<Mutex<VecDeque<WorkItem>>>,
        processor: Arc<P>,
        tx: mpsc::UnboundedSender<Completion<P::Output>>,
    ) {
        loop {
            let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
            let Some(item) = next else {
                break;
            };

            let task_processor = Arc::clone(&processor);
            let task_item = item.clone();
            let handle = tokio::spawn(async move {
                let mut log = ItemLog::new();
                let result = task_processor.process(&task_item, &mut log).await;
                (result, log)
            });

            let (result, log) = match handle.await {
                Ok((result, log)) => (result.map_err(|e| e.to_string()), log),
                Err(e) => (Err(format!("processing aborted: {}", e)), ItemLog::new()),
            };

            if tx.send(Completion { item, result, log }).is_err() {
                break;
            }
        }
    }
}
