use super::*;
use crate::error::ResyncError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct TrackingProcessor {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    processed: AtomicUsize,
}

#[async_trait]
impl Processor for TrackingProcessor {
    type Output = usize;

    async fn process(&self, item: &WorkItem, log: &mut ItemLog) -> Result<usize> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        log.info(format!("start {}", item.slug));

        tokio::time::sleep(Duration::from_millis(10 + (item.index as u64 % 3) * 5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
        match item.slug.as_str() {
            "image-4" => Err(ResyncError::local_store("pull", "image-4", "denied")),
            "image-7" => panic!("processor bug"),
            _ => {
                log.success("done");
                Ok(item.index)
            }
        }
    }
}

#[derive(Default)]
struct RecordingObserver {
    fulfilled: Vec<usize>,
    failed: Vec<ItemFailure>,
    outstanding: Vec<usize>,
    logs: Vec<ItemLog>,
    completed: usize,
}

impl SchedulerObserver<usize> for RecordingObserver {
    fn fulfilled(&mut self, _item: &WorkItem, output: usize, log: ItemLog) {
        self.fulfilled.push(output);
        self.logs.push(log);
    }

    fn failed(&mut self, failure: &ItemFailure, log: ItemLog) {
        self.failed.push(failure.clone());
        self.logs.push(log);
    }

    fn outstanding(&mut self, remaining: usize) {
        self.outstanding.push(remaining);
    }

    fn complete(&mut self, _failures: &[ItemFailure]) {
        self.completed += 1;
    }
}

fn slugs(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("image-{}", i)).collect()
}

#[test]
fn test_zero_concurrency_is_one() {
    assert_eq!(Scheduler::new(0).concurrency(), 1);
    assert_eq!(Scheduler::new(4).concurrency(), 4);
}

#[test]
fn test_work_item_position() {
    let item = WorkItem {
        index: 3,
        total: 10,
        slug: "redis".to_string(),
    };
    assert_eq!(item.position(), "[4/10]");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bounded_concurrency_with_isolated_failures() {
    let processor = Arc::new(TrackingProcessor::default());
    let mut observer = RecordingObserver::default();

    let summary = Scheduler::new(3)
        .run(slugs(10), Arc::clone(&processor), &mut observer)
        .await;

    assert!(processor.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(summary.total, 10);
    assert_eq!(summary.succeeded, 8);
    assert_eq!(observer.completed, 1);
    assert_eq!(observer.logs.len(), 10);

    let mut fulfilled = observer.fulfilled.clone();
    fulfilled.sort_unstable();
    assert_eq!(fulfilled, vec![0, 1, 2, 4, 5, 7, 8, 9]);

    let mut failed: Vec<_> = observer.failed.iter().map(|f| f.item.index).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec![3, 6]);
    assert_eq!(summary.failures.len(), 2);
}

#[tokio::test]
async fn test_failure_message_names_item() {
    let processor = Arc::new(TrackingProcessor::default());
    let mut observer = RecordingObserver::default();

    Scheduler::new(2)
        .run(slugs(4), processor, &mut observer)
        .await;

    let failure = &observer.failed[0];
    assert_eq!(failure.item.slug, "image-4");
    assert_eq!(failure.item.index, 3);
    assert_eq!(failure.to_string(), "image-4: Failed to pull 'image-4': denied");
}

#[tokio::test]
async fn test_outstanding_notices_once_queue_drains() {
    let processor = Arc::new(TrackingProcessor::default());
    let mut observer = RecordingObserver::default();

    Scheduler::new(2)
        .run(slugs(5), processor, &mut observer)
        .await;

    assert_eq!(observer.outstanding, vec![2, 1]);
}

#[tokio::test]
async fn test_empty_input_completes_once() {
    let processor = Arc::new(TrackingProcessor::default());
    let mut observer = RecordingObserver::default();

    let summary = Scheduler::new(3).run(Vec::new(), processor, &mut observer).await;

    assert_eq!(summary, RunSummary::default());
    assert_eq!(observer.completed, 1);
}

#[tokio::test]
async fn test_logs_travel_with_their_item() {
    let processor = Arc::new(TrackingProcessor::default());
    let mut observer = RecordingObserver::default();

    Scheduler::new(1)
        .run(slugs(2), processor, &mut observer)
        .await;

    assert_eq!(observer.logs[0].lines()[0].text, "start image-1");
    assert_eq!(observer.logs[0].lines()[1].kind, LineKind::Success);
    assert_eq!(observer.logs[1].lines()[0].text, "start image-2");
}
