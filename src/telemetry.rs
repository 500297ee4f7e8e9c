//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `smartspend_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: advisor operation (e.g. "generate_financial_insights")
//! - `endpoint`: rate limiter endpoint name (e.g. "ai", "auth")
//! - `cache`: "memory" or "local"
//! - `status`: "ok" or "error"

/// Total AI requests dispatched through the API client.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "smartspend_requests_total";

/// Request duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "smartspend_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "smartspend_retries_total";

/// Total requests denied by a rate limiter.
///
/// Labels: `endpoint`.
pub const RATE_LIMITED_TOTAL: &str = "smartspend_rate_limited_total";

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "smartspend_cache_hits_total";

/// Total cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "smartspend_cache_misses_total";

/// Tasks waiting in the request queue backlog.
pub const QUEUE_PENDING: &str = "smartspend_queue_pending";

/// Tasks currently executing through the request queue.
pub const QUEUE_IN_FLIGHT: &str = "smartspend_queue_in_flight";
