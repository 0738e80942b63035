use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn test_value_is_memoized() {
    let memo: SingleFlight<String> = SingleFlight::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let value = memo
            .get_or_try_init::<(), _, _>("registry-1.docker.io", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("https://auth.docker.io/token".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "https://auth.docker.io/token");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(memo.len(), 1);
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_initialisation() {
    let memo: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let memo = Arc::clone(&memo);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            memo.get_or_init("gcr.io", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                7
            })
            .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_initialisation_is_retried() {
    let memo: SingleFlight<u32> = SingleFlight::new();

    let first: Result<u32, &str> = memo.get_or_try_init("quay.io", || async { Err("down") }).await;
    assert!(first.is_err());
    assert!(memo.get("quay.io").is_none());
    assert!(memo.is_empty());

    let second: Result<u32, &str> = memo.get_or_try_init("quay.io", || async { Ok(1) }).await;
    assert_eq!(second, Ok(1));
    assert_eq!(memo.get("quay.io"), Some(1));
}

#[tokio::test]
async fn test_keys_are_independent() {
    let memo: SingleFlight<Option<String>> = SingleFlight::new();

    memo.get_or_init("a", || async { Some("alice".to_string()) }).await;
    memo.get_or_init("b", || async { None }).await;

    assert_eq!(memo.get("a"), Some(Some("alice".to_string())));
    assert_eq!(memo.get("b"), Some(None));
    assert_eq!(memo.get("c"), None);
    assert_eq!(memo.len(), 2);
}
