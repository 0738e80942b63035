use super::*;
use crate::error::ResyncError;
use crate::reference::ImageIdentity;
use crate::store::{DigestRecord, HistoryEntry, MemoryStore, StoreCall};
use async_trait::async_trait;

const NEW: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";

/// Reports every image at `NEW`, except `missing` which the registry does not know.
struct Registry;

#[async_trait]
impl DigestSource for Registry {
    async fn remote_digest(&self, image: &ImageIdentity) -> Result<String> {
        if image.name() == "missing" {
            return Err(ResyncError::digest_fetch(image.to_string(), "manifest unknown", Some(404)));
        }
        Ok(format!("{}@{}", image.full_reference(), NEW))
    }
}

#[derive(Default)]
struct Recorder {
    finished: Vec<(String, bool)>,
    outstanding: Vec<usize>,
}

impl Progress for Recorder {
    fn item_finished(&mut self, item: &WorkItem, _log: &ItemLog, failure: Option<&ItemFailure>) {
        self.finished.push((item.slug.clone(), failure.is_none()));
    }

    fn outstanding(&mut self, remaining: usize) {
        self.outstanding.push(remaining);
    }
}

fn shared_history(top: &str) -> Vec<HistoryEntry> {
    vec![
        HistoryEntry::new(top, "t3", "1MB"),
        HistoryEntry::new("RUN apt-get install", "t2", "3MB"),
        HistoryEntry::new("ADD rootfs", "t1", "5MB"),
    ]
}

fn record(digest: String, size: u64) -> DigestRecord {
    DigestRecord {
        repo_digests: vec![digest],
        root_layers: vec!["sha256:base".to_string()],
        size_bytes: size,
    }
}

fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_local("api:1", record(format!("api@{}", NEW), 9_000_000), shared_history("CMD api"));
    store.insert_local("web:1", record("web@sha256:old".to_string(), 4_000_000), shared_history("CMD old"));
    store.publish("web:1", record(format!("web@{}", NEW), 5_000_000), shared_history("CMD web"));
    store
}

fn resync(store: Arc<MemoryStore>) -> ResyncBuilder {
    Resync::builder()
        .with_store(store)
        .with_digest_source(Arc::new(Registry))
        .concurrency(2)
}

fn slugs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_refresh_aggregates_stats_and_failures() {
    let store = store();
    let resync = resync(Arc::clone(&store)).build().unwrap();
    let mut progress = Recorder::default();

    let report = resync
        .refresh(slugs(&["api:1", "web:1", "missing:1"]), &mut progress)
        .await;

    assert_eq!(report.mode, ReportMode::Refresh);
    assert_eq!(report.total_images, 3);
    let stats = report.stats.unwrap();
    assert_eq!(stats.bytes_steady, 9_000_000);
    assert_eq!(stats.bytes_removed, 4_000_000);
    assert_eq!(stats.bytes_added, 5_000_000);
    assert_eq!(stats.images_refreshed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("missing:1: "));
    assert_eq!(progress.finished.len(), 3);
    assert!(progress.finished.contains(&("missing:1".to_string(), false)));
    assert!(store.calls().contains(&StoreCall::Pull("web:1".to_string())));
}

#[tokio::test]
async fn test_refresh_reports_shared_history() {
    let resync = resync(store()).build().unwrap();

    let report = resync.refresh(slugs(&["api:1", "web:1"]), &mut NoProgress).await;

    // Both images share the two bottom build steps.
    assert_eq!(report.dedup.history_reuse.shared_nodes, 2);
    assert_eq!(report.dedup.total_real_bytes, 10_000_000);
}

#[tokio::test]
async fn test_dry_run_never_mutates() {
    let store = store();
    let resync = resync(Arc::clone(&store)).dry_run(true).build().unwrap();

    let report = resync.refresh(slugs(&["api:1", "web:1"]), &mut NoProgress).await;

    assert_eq!(report.mode, ReportMode::DryRun);
    assert!(store.calls().is_empty());
    assert_eq!(report.stats.unwrap().images_refreshed, 1);
}

#[tokio::test]
async fn test_report_only_lists_images_sorted() {
    let store = store();
    let resync = resync(Arc::clone(&store)).build().unwrap();

    let report = resync
        .report_only(slugs(&["web:1", "api:1"]), &mut NoProgress)
        .await;

    assert_eq!(report.mode, ReportMode::ReportOnly);
    assert!(report.stats.is_none());
    let names: Vec<&str> = report.images.iter().map(|r| r.image.as_str()).collect();
    assert_eq!(names, ["api:1", "web:1"]);
    assert_eq!(report.images[0].virtual_bytes, 9_000_000);
    assert_eq!(report.images[0].reuse_bytes, 8_000_000);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_each_run_starts_with_empty_dedup() {
    let resync = resync(store()).build().unwrap();

    resync.report_only(slugs(&["api:1"]), &mut NoProgress).await;
    let report = resync.report_only(slugs(&["web:1"]), &mut NoProgress).await;

    // Only web:1's three build steps.
    assert_eq!(report.dedup.total_real_bytes, 9_000_000);
}

#[tokio::test]
async fn test_empty_input_yields_empty_report() {
    let resync = resync(store()).build().unwrap();
    let report = resync.refresh(Vec::new(), &mut NoProgress).await;
    assert_eq!(report.total_images, 0);
    assert!(!report.has_errors());
}

#[test]
fn test_builder_overrides_config() {
    let mut config = Config::default();
    config.sync.concurrency = Some(8);
    config.sync.backup_tag = "previous".to_string();

    let resync = resync(store()).with_config(config).concurrency(0).build().unwrap();

    assert_eq!(resync.concurrency(), 1);
    assert_eq!(resync.options().backup_tag, "previous");
    assert!(!resync.options().dry_run);
}
