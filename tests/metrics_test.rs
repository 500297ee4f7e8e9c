//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

use smartspend::telemetry;
use smartspend::{
    ApiClient, ApiClientConfig, CacheConfig, FinancialAdvisor, MemoryCache, RateLimitConfig,
    RateLimiter, RetryConfig, SmartSpendError, with_retry,
};

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying label `label=value`.
fn labelled_total(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

#[test]
fn memory_cache_counts_hits_and_misses() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache = MemoryCache::new(&CacheConfig::default());
        cache.get("missing");
        cache.insert("k", 1);
        cache.get("k");
        cache.get("k");
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        labelled_total(&snapshot, telemetry::CACHE_HITS_TOTAL, "cache", "memory"),
        2
    );
    assert_eq!(
        labelled_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, "cache", "memory"),
        1
    );
}

#[test]
fn local_cache_counts_hits_and_misses() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let dir = tempfile::tempdir().unwrap();

    metrics::with_local_recorder(&recorder, || {
        let cache = smartspend::LocalCache::new(dir.path());
        cache.get::<u32>("k");
        cache.set("k", &1u32, Duration::from_secs(60));
        cache.get::<u32>("k");
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        labelled_total(&snapshot, telemetry::CACHE_HITS_TOTAL, "cache", "local"),
        1
    );
    assert_eq!(
        labelled_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, "cache", "local"),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn denials_increment_rate_limited_counter() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let limiter = RateLimiter::new(RateLimitConfig::new("auth").max_requests(1));
        for _ in 0..4 {
            limiter.check_rate_limit("u1", false, false);
        }
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        labelled_total(&snapshot, telemetry::RATE_LIMITED_TOTAL, "endpoint", "auth"),
        3
    );
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let config = RetryConfig::new().delay(Duration::from_millis(1));
                with_retry(&config, "flaky", || async {
                    Err::<(), _>(SmartSpendError::Timeout)
                })
                .await
            })
        })
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        labelled_total(&snapshot, telemetry::RETRIES_TOTAL, "operation", "flaky"),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn api_requests_record_count_and_duration() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let client = ApiClient::new(ApiClientConfig::new(server.uri()).cache_dir(dir.path())).unwrap();

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let response = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(async { client.generate_financial_insights("u1").await })
        })
    });
    assert!(!response.success);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(
        labelled_total(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}
