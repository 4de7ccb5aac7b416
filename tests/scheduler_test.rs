//! Tests for [`RequestScheduler`]: priority queue, worker pool and result cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, oneshot};

use mizan::cache::{CacheConfig, TtlCache};
use mizan::scheduler::{RequestScheduler, ScheduleOptions, SchedulerConfig};
use mizan::{MizanError, Result};

fn scheduler(max_concurrent: usize) -> RequestScheduler<String> {
    let cache = Arc::new(TtlCache::new("results", &CacheConfig::default()));
    RequestScheduler::new(
        SchedulerConfig::new().max_concurrent(max_concurrent),
        cache,
    )
}

/// Occupy the only worker until `release` fires. Resolves once it is running.
async fn block_worker(
    scheduler: &RequestScheduler<String>,
) -> (oneshot::Sender<()>, mizan::Scheduled<String>) {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let blocker = scheduler.submit(
        "blocker",
        move || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok("blocker".to_string())
        },
        ScheduleOptions::new().use_cache(false),
    );
    started_rx.await.unwrap();
    (release_tx, blocker)
}

#[tokio::test]
async fn returns_operation_result() {
    let scheduler = scheduler(3);
    let result = scheduler
        .schedule("a", || async { Ok("done".to_string()) }, ScheduleOptions::new())
        .await;
    assert_eq!(result.unwrap(), "done");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_exceeds_max_concurrent() {
    const LIMIT: usize = 2;
    const JOBS: usize = 6;

    let scheduler = scheduler(LIMIT);
    let gate = Arc::new(Semaphore::new(0));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..JOBS)
        .map(|i| {
            let gate = Arc::clone(&gate);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            scheduler.submit(
                format!("job-{i}"),
                move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let permit = gate.acquire().await.unwrap();
                    permit.forget();
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(format!("result-{i}"))
                },
                ScheduleOptions::new(),
            )
        })
        .collect();

    // Give the workers time to pick up as much as they are allowed to.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(running.load(Ordering::SeqCst), LIMIT);
    let stats = scheduler.stats();
    assert_eq!(stats.active, LIMIT);
    assert_eq!(stats.queued, JOBS - LIMIT);

    gate.add_permits(JOBS);
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), format!("result-{i}"));
    }
    assert_eq!(peak.load(Ordering::SeqCst), LIMIT);
}

#[tokio::test]
async fn higher_priority_runs_first() {
    let scheduler = scheduler(1);
    let (release, blocker) = block_worker(&scheduler).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let submit = |id: &'static str, priority: i32| {
        let order = Arc::clone(&order);
        scheduler.submit(
            id,
            move || async move {
                order.lock().unwrap().push(id);
                Ok(id.to_string())
            },
            ScheduleOptions::new().priority(priority),
        )
    };
    let low = submit("low", 1);
    let high = submit("high", 5);

    release.send(()).unwrap();
    blocker.await.unwrap();
    high.await.unwrap();
    low.await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["high", "low"]);
}

#[tokio::test]
async fn equal_priority_is_fifo() {
    let scheduler = scheduler(1);
    let (release, blocker) = block_worker(&scheduler).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|id| {
            let order = Arc::clone(&order);
            scheduler.submit(
                id,
                move || async move {
                    order.lock().unwrap().push(id);
                    Ok(id.to_string())
                },
                ScheduleOptions::new(),
            )
        })
        .collect();

    release.send(()).unwrap();
    blocker.await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn cached_result_skips_operation() {
    let scheduler = scheduler(2);
    let calls = Arc::new(AtomicUsize::new(0));

    let run = |calls: Arc<AtomicUsize>| {
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("estimate".to_string())
        }
    };

    let first = scheduler
        .schedule("same-id", run(Arc::clone(&calls)), ScheduleOptions::new())
        .await
        .unwrap();
    let second = scheduler.submit("same-id", run(Arc::clone(&calls)), ScheduleOptions::new());
    assert!(second.is_cached());
    assert_eq!(second.await.unwrap(), first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn use_cache_false_always_runs() {
    let scheduler = scheduler(2);
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let calls = Arc::clone(&calls);
        scheduler
            .schedule(
                "uncached",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("x".to_string())
                },
                ScheduleOptions::new().use_cache(false),
            )
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!scheduler.cache().contains_key("uncached"));
}

#[tokio::test(start_paused = true)]
async fn cached_result_expires_with_its_ttl() {
    let scheduler = scheduler(1);
    scheduler
        .schedule(
            "k",
            || async { Ok("v".to_string()) },
            ScheduleOptions::new().cache_ttl(Duration::from_secs(10)),
        )
        .await
        .unwrap();
    assert!(scheduler.cache().contains_key("k"));

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(!scheduler.cache().contains_key("k"));
}

#[tokio::test]
async fn failure_reaches_only_its_caller_and_is_not_cached() {
    let scheduler = scheduler(1);
    let calls = Arc::new(AtomicUsize::new(0));

    let failing = {
        let calls = Arc::clone(&calls);
        scheduler.submit(
            "flaky",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(MizanError::Api {
                    status: 502,
                    message: "bad gateway".into(),
                })
            },
            ScheduleOptions::new(),
        )
    };
    let healthy = scheduler.submit(
        "healthy",
        || async { Ok("fine".to_string()) },
        ScheduleOptions::new(),
    );

    let err = failing.await.unwrap_err();
    assert!(err.is_service_error());
    assert_eq!(healthy.await.unwrap(), "fine");
    assert!(!scheduler.cache().contains_key("flaky"));

    // A retry runs the operation again.
    let calls_retry = Arc::clone(&calls);
    let retried: Result<String> = scheduler
        .schedule(
            "flaky",
            move || async move {
                calls_retry.fetch_add(1, Ordering::SeqCst);
                Ok("recovered".to_string())
            },
            ScheduleOptions::new(),
        )
        .await;
    assert_eq!(retried.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_the_caller() {
    let scheduler = scheduler(1);
    let result = scheduler
        .schedule(
            "slow",
            || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("late".to_string())
            },
            ScheduleOptions::new().timeout(Duration::from_secs(5)),
        )
        .await;
    assert!(matches!(result, Err(MizanError::Timeout(d)) if d == Duration::from_secs(5)));
    assert!(!scheduler.cache().contains_key("slow"));
}

#[tokio::test]
async fn panic_is_reported_and_workers_survive() {
    let scheduler = scheduler(1);
    let result = scheduler
        .schedule(
            "explodes",
            || async {
                if "boom".len() == 4 {
                    panic!("boom");
                }
                Ok("unreachable".to_string())
            },
            ScheduleOptions::new(),
        )
        .await;
    match result {
        Err(MizanError::OperationPanicked(message)) => assert_eq!(message, "boom"),
        other => panic!("expected OperationPanicked, got {other:?}"),
    }

    let next = scheduler
        .schedule("after", || async { Ok("ok".to_string()) }, ScheduleOptions::new())
        .await;
    assert_eq!(next.unwrap(), "ok");
}

#[tokio::test]
async fn closed_scheduler_drains_queue_but_rejects_new_work() {
    let scheduler = scheduler(1);
    let (release, blocker) = block_worker(&scheduler).await;

    let queued = scheduler.submit(
        "queued",
        || async { Ok("still runs".to_string()) },
        ScheduleOptions::new(),
    );
    scheduler.close();

    let rejected = scheduler
        .schedule("late", || async { Ok("no".to_string()) }, ScheduleOptions::new())
        .await;
    assert!(matches!(rejected, Err(MizanError::SchedulerClosed)));

    release.send(()).unwrap();
    blocker.await.unwrap();
    assert_eq!(queued.await.unwrap(), "still runs");
}
