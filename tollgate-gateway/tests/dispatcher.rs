//! Timing and ordering behaviour of the dispatcher over virtual time.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tollgate_core::config::{BucketConfig, DispatcherConfig};
use tollgate_core::error::DispatchError;
use tollgate_gateway::rest::{RateLimitedDispatcher, TokenBucket};

fn bucket(capacity: u32, refill: u32, interval_ms: u64) -> Arc<TokenBucket> {
    Arc::new(
        TokenBucket::new(BucketConfig::new(
            capacity,
            refill,
            Duration::from_millis(interval_ms),
        ))
        .unwrap(),
    )
}

fn dispatcher(
    limit: u32,
    release_ms: u64,
    queue_capacity: usize,
    bucket: Arc<TokenBucket>,
) -> RateLimitedDispatcher {
    RateLimitedDispatcher::new(
        DispatcherConfig::new(limit, Duration::from_millis(release_ms))
            .with_queue_capacity(queue_capacity),
        bucket,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_bucket_paces_starts() {
    let dispatcher = dispatcher(5, 100, 100, bucket(2, 1, 1_000));
    let origin = Instant::now();

    let admissions: Vec<_> = (0..5)
        .map(|_| {
            dispatcher
                .submit(|| {
                    let started = Instant::now();
                    async move { started }
                })
                .unwrap()
        })
        .collect();

    let mut offsets = Vec::new();
    for admission in admissions {
        offsets.push(admission.await.unwrap() - origin);
    }

    assert_eq!(offsets[0], Duration::ZERO);
    assert_eq!(offsets[1], Duration::ZERO);
    assert!(offsets[2] >= Duration::from_millis(1_000));
    assert!(offsets[3] >= Duration::from_millis(2_000));
    assert!(offsets[4] >= Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn test_queue_full_only_at_capacity() {
    let dispatcher = dispatcher(1, 100, 3, bucket(10, 1, 100));

    let admitted: Vec<_> = (0..3u32)
        .map(|i| dispatcher.submit(move || async move { i }).unwrap())
        .collect();
    assert_eq!(dispatcher.queue_len(), 3);

    let rejected = dispatcher.submit(|| async { 99 });
    assert_eq!(
        rejected.unwrap_err(),
        DispatchError::QueueFull { capacity: 3 }
    );
    assert_eq!(dispatcher.queue_len(), 3);

    for (i, admission) in admitted.into_iter().enumerate() {
        assert_eq!(admission.await, Ok(i as u32));
    }
}

#[tokio::test(start_paused = true)]
async fn test_starts_in_submission_order() {
    let dispatcher = dispatcher(2, 50, 100, bucket(3, 1, 20));
    let order = Arc::new(Mutex::new(Vec::new()));

    let admissions: Vec<_> = (0..10usize)
        .map(|i| {
            let order = Arc::clone(&order);
            dispatcher
                .submit(move || {
                    order.lock().push(i);
                    async {}
                })
                .unwrap()
        })
        .collect();

    for admission in admissions {
        admission.await.unwrap();
    }
    assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_limit() {
    let dispatcher = dispatcher(2, 500, 100, bucket(100, 100, 10));
    let origin = Instant::now();
    let observed = Arc::new(Mutex::new(Vec::new()));

    let admissions: Vec<_> = (0..6)
        .map(|_| {
            let observed = Arc::clone(&observed);
            let probe = dispatcher.clone();
            dispatcher
                .submit(move || {
                    observed
                        .lock()
                        .push((probe.in_flight(), Instant::now() - origin));
                    // Outlives the release delay on purpose.
                    time::sleep(Duration::from_millis(2_000))
                })
                .unwrap()
        })
        .collect();

    for admission in admissions {
        admission.await.unwrap();
    }

    let observed = observed.lock();
    assert!(observed.iter().all(|(in_flight, _)| *in_flight <= 2));
    let starts: Vec<Duration> = observed.iter().map(|(_, at)| *at).collect();
    assert_eq!(starts[0], Duration::ZERO);
    assert_eq!(starts[1], Duration::ZERO);
    assert!(starts[2] >= Duration::from_millis(500));
    assert!(starts[3] >= Duration::from_millis(500));
    assert!(starts[4] >= Duration::from_millis(1_000));
    assert!(starts[5] >= Duration::from_millis(1_000));
    // Slots free on the timer, not when the long work finishes.
    assert!(starts[5] < Duration::from_millis(2_000));
}

#[tokio::test(start_paused = true)]
async fn test_failing_work_releases_slot() {
    let dispatcher = dispatcher(1, 100, 10, bucket(10, 1, 100));
    let origin = Instant::now();

    let failed = dispatcher
        .submit(|| async { Err::<(), _>("boom") })
        .unwrap();
    let next = dispatcher
        .submit(|| {
            let started = Instant::now();
            async move { started }
        })
        .unwrap();

    assert_eq!(failed.await, Ok(Err("boom")));
    let started = next.await.unwrap();
    assert!(started - origin >= Duration::from_millis(100));
    assert!(started - origin < Duration::from_millis(200));

    time::sleep(Duration::from_millis(200)).await;
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_bucket_stays_within_bounds() {
    let bucket = bucket(3, 2, 100);
    let dispatcher = dispatcher(3, 10, 100, Arc::clone(&bucket));

    for _ in 0..5 {
        let admissions: Vec<_> = (0..4)
            .map(|_| dispatcher.submit(|| async {}).unwrap())
            .collect();
        for admission in admissions {
            admission.await.unwrap();
            assert!(bucket.available() <= bucket.capacity());
        }
    }

    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(bucket.available(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shared_bucket_paces_both_dispatchers() {
    let shared = bucket(2, 1, 1_000);
    let first = dispatcher(5, 10, 10, Arc::clone(&shared));
    let second = dispatcher(5, 10, 10, Arc::clone(&shared));
    let origin = Instant::now();

    first.submit(|| async {}).unwrap().await.unwrap();
    second.submit(|| async {}).unwrap().await.unwrap();
    assert_eq!(shared.available(), 0);

    let started = first
        .submit(|| {
            let started = Instant::now();
            async move { started }
        })
        .unwrap()
        .await
        .unwrap();
    assert!(started - origin >= Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn test_bucket_failure_keeps_entry_queued() {
    let bucket = bucket(1, 1, 1_000);
    let dispatcher = dispatcher(1, 10, 10, Arc::clone(&bucket));

    bucket.shutdown();
    let admission = dispatcher.submit(|| async { 1 }).unwrap();
    time::sleep(Duration::from_millis(50)).await;

    assert_eq!(dispatcher.queue_len(), 1);
    assert_eq!(dispatcher.in_flight(), 0);

    assert_eq!(dispatcher.close(), 1);
    assert_eq!(admission.await, Err(DispatchError::Abandoned));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_admission_still_runs() {
    let dispatcher = dispatcher(1, 100, 10, bucket(10, 1, 100));
    let ran = Arc::new(Mutex::new(false));

    {
        let ran = Arc::clone(&ran);
        drop(dispatcher.submit(move || {
            *ran.lock() = true;
            async {}
        }));
    }

    time::sleep(Duration::from_millis(10)).await;
    assert!(*ran.lock());
    assert_eq!(dispatcher.in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_returns_pending_token_to_bucket() {
    let bucket = bucket(1, 1, 1_000);
    let dispatcher = dispatcher(5, 10, 10, Arc::clone(&bucket));

    dispatcher.submit(|| async {}).unwrap().await.unwrap();
    assert_eq!(bucket.available(), 0);

    // The pump is now parked waiting for the next refill.
    let admission = dispatcher.submit(|| async {}).unwrap();
    tokio::task::yield_now().await;
    assert_eq!(bucket.waiting(), 1);

    assert_eq!(dispatcher.close(), 1);
    assert_eq!(admission.await, Err(DispatchError::Abandoned));

    time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(bucket.waiting(), 0);
    assert_eq!(bucket.available(), 1);
    assert_eq!(dispatcher.in_flight(), 0);
}
