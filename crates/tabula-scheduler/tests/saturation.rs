//! Queued-mode behaviour under paused time

use futures::future::join_all;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabula_scheduler::{
    RateLimitPolicy, RateLimitedScheduler, RemoteFailure, ScheduleError, SchedulerConfig,
    SchedulerMode,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiError {
    status: u16,
    message: String,
}

impl ApiError {
    fn status(status: u16) -> Self {
        Self {
            status,
            message: format!("status {status}"),
        }
    }
}

impl RemoteFailure for ApiError {
    fn status_code(&self) -> Option<u16> {
        Some(self.status)
    }

    fn failure_message(&self) -> String {
        self.message.clone()
    }
}

fn config() -> SchedulerConfig {
    SchedulerConfig::default().with_jitter(Duration::ZERO)
}

/// Operation failing with 429 on its first `failures` invocations
fn flaky(
    failures: u32,
    counter: Arc<AtomicU32>,
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
) -> impl FnMut() -> futures::future::Ready<Result<&'static str, ApiError>> + Send + 'static {
    move || {
        log.lock().push(label);
        let seen = counter.fetch_add(1, Ordering::SeqCst);
        if seen < failures {
            futures::future::ready(Err(ApiError::status(429)))
        } else {
            futures::future::ready(Ok(label))
        }
    }
}

async fn wait_until_saturated(scheduler: &RateLimitedScheduler<ApiError>) {
    while scheduler.mode() != SchedulerMode::Saturated {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn every_call_resolves_after_a_burst_of_rate_limits() {
    let scheduler = RateLimitedScheduler::new(config());
    let log = Arc::new(Mutex::new(Vec::new()));
    let counters: Vec<_> = (0..5).map(|_| Arc::new(AtomicU32::new(0))).collect();

    let calls = counters.iter().map(|counter| {
        scheduler.execute(flaky(1, Arc::clone(counter), "call", Arc::clone(&log)))
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.mode, SchedulerMode::Normal);
    assert_eq!(snapshot.queue_len, 0);
    assert!(!snapshot.draining);
    assert_eq!(snapshot.current_base_delay, Duration::from_secs(1));
    assert_eq!(snapshot.calls_completed, 5);
}

#[tokio::test(start_paused = true)]
async fn queued_calls_run_in_submission_order() {
    let scheduler = RateLimitedScheduler::new(config());
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = tokio::spawn({
        let scheduler = scheduler.clone();
        let op = flaky(1, Arc::new(AtomicU32::new(0)), "first", Arc::clone(&log));
        async move { scheduler.execute(op).await }
    });
    wait_until_saturated(&scheduler).await;

    let a = scheduler.execute(flaky(0, Arc::new(AtomicU32::new(0)), "a", Arc::clone(&log)));
    let b = scheduler.execute(flaky(0, Arc::new(AtomicU32::new(0)), "b", Arc::clone(&log)));
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
    assert_eq!(first.await.unwrap().unwrap(), "first");
    assert_eq!(*log.lock(), vec!["first", "first", "a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_grow_while_rate_limited() {
    let scheduler = RateLimitedScheduler::new(config());
    let started = tokio::time::Instant::now();

    let value = scheduler
        .execute(flaky(3, Arc::new(AtomicU32::new(0)), "x", Arc::new(Mutex::new(Vec::new()))))
        .await
        .unwrap();

    assert_eq!(value, "x");
    // 2s (attempt 1) + 4s (attempt 2) + 8s (attempt 3)
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(14), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(14_100), "{elapsed:?}");
    assert_eq!(scheduler.snapshot().current_base_delay, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn deadline_skips_queued_call() {
    let scheduler = RateLimitedScheduler::new(config());
    let log = Arc::new(Mutex::new(Vec::new()));

    let blocker = tokio::spawn({
        let scheduler = scheduler.clone();
        let op = flaky(1, Arc::new(AtomicU32::new(0)), "blocker", Arc::clone(&log));
        async move { scheduler.execute(op).await }
    });
    wait_until_saturated(&scheduler).await;

    let late = Arc::new(AtomicU32::new(0));
    let err = scheduler
        .execute_with_deadline(
            flaky(0, Arc::clone(&late), "late", Arc::clone(&log)),
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScheduleError::Timeout { waited } if waited == Duration::from_millis(500)
    ));
    assert_eq!(blocker.await.unwrap().unwrap(), "blocker");
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(late.load(Ordering::SeqCst), 0);
    assert!(!log.lock().contains(&"late"));
    assert_eq!(scheduler.mode(), SchedulerMode::Normal);
}

#[tokio::test(start_paused = true)]
async fn abandoned_queue_keeps_the_backoff_until_a_success() {
    let scheduler = RateLimitedScheduler::new(config());

    let err = scheduler
        .execute_with_deadline(
            || async { Err::<(), _>(ApiError::status(429)) },
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    tokio::time::sleep(Duration::from_secs(120)).await;

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.mode, SchedulerMode::Saturated);
    assert!(!snapshot.draining);
    assert_eq!(snapshot.queue_len, 0);
    assert_eq!(snapshot.current_base_delay, Duration::from_secs(4));
    assert_eq!(snapshot.rate_limit_hits, 3);
    assert_eq!(snapshot.calls_completed, 0);

    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();
    let value = scheduler
        .execute(flaky(0, Arc::clone(&calls), "next", Arc::new(Mutex::new(Vec::new()))))
        .await
        .unwrap();

    assert_eq!(value, "next");
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.mode, SchedulerMode::Normal);
    assert_eq!(snapshot.current_base_delay, Duration::from_secs(1));
    assert_eq!(snapshot.calls_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn default_deadline_applies_to_execute() {
    let scheduler =
        RateLimitedScheduler::new(config().with_default_deadline(Duration::from_secs(1)));

    let err = scheduler
        .execute(flaky(10, Arc::new(AtomicU32::new(0)), "slow", Arc::new(Mutex::new(Vec::new()))))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn non_rate_limit_failure_from_queue_is_returned_unchanged() {
    let scheduler = RateLimitedScheduler::new(config());
    let log = Arc::new(Mutex::new(Vec::new()));

    let blocker = tokio::spawn({
        let scheduler = scheduler.clone();
        let op = flaky(1, Arc::new(AtomicU32::new(0)), "blocker", Arc::clone(&log));
        async move { scheduler.execute(op).await }
    });
    wait_until_saturated(&scheduler).await;

    let err = scheduler
        .execute(|| async {
            Err::<(), _>(ApiError {
                status: 400,
                message: "Unable to parse range".to_string(),
            })
        })
        .await
        .unwrap_err();

    assert_eq!(
        err.into_remote(),
        Some(ApiError {
            status: 400,
            message: "Unable to parse range".to_string()
        })
    );
    assert!(blocker.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn quota_message_triggers_queueing() {
    let policy = RateLimitPolicy::default();
    let scheduler = RateLimitedScheduler::new(config().with_rate_limit(policy));
    let counter = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&counter);

    let value = scheduler
        .execute(move || {
            let attempt = seen.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(ApiError {
                        status: 500,
                        message: "Quota exceeded for quota metric 'Write requests'".to_string(),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 1);
    assert_eq!(scheduler.snapshot().rate_limit_hits, 1);
}
