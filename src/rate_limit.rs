//! Fixed-window rate limiting with a burst allowance.
//!
//! One [`RateLimiter`] guards one endpoint. Counters are keyed by
//! `endpoint:identifier`; a window opens on the first request and every
//! admitted request increments the counter until the window expires.
//! Requests beyond `max_requests` but within `burst_allowance` are still
//! admitted and tracked separately.
//!
//! State is in-memory only: it resets on restart and is not shared between
//! processes.
//!
//! ```rust
//! # use smartspend::{RateLimitConfig, RateLimiter};
//! # use std::time::Duration;
//! let limiter = RateLimiter::new(
//!     RateLimitConfig::new("ai")
//!         .max_requests(3)
//!         .window(Duration::from_secs(1)),
//! );
//! assert!(limiter.check_rate_limit("user-1", true, false).allowed);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;

/// Default interval between sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for a single endpoint's limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Endpoint name used in counter keys and metric labels.
    pub endpoint: String,
    /// Requests admitted per window before the burst region. Default: 100.
    pub max_requests: u32,
    /// Window length. Default: 60s.
    pub window: Duration,
    /// Extra requests admitted past `max_requests`. Default: 0.
    pub burst_allowance: u32,
    /// Admins skip the limiter entirely. Default: true.
    pub bypass_admin: bool,
    /// Authenticated callers skip the limiter. Default: false.
    pub bypass_authenticated: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            endpoint: "api".to_string(),
            max_requests: 100,
            window: Duration::from_secs(60),
            burst_allowance: 0,
            bypass_admin: true,
            bypass_authenticated: false,
        }
    }
}

impl RateLimitConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// General backend calls: 100 per minute, burst of 20.
    pub fn api() -> Self {
        Self::new("api").burst_allowance(20)
    }

    /// AI endpoint calls: 10 per minute, burst of 2.
    pub fn ai() -> Self {
        Self::new("ai").max_requests(10).burst_allowance(2)
    }

    /// Sign-in attempts: 5 per 15 minutes, no burst, no bypass.
    pub fn auth() -> Self {
        Self::new("auth")
            .max_requests(5)
            .window(Duration::from_secs(15 * 60))
            .bypass_admin(false)
    }

    pub fn max_requests(mut self, n: u32) -> Self {
        self.max_requests = n;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn burst_allowance(mut self, n: u32) -> Self {
        self.burst_allowance = n;
        self
    }

    pub fn bypass_admin(mut self, enabled: bool) -> Self {
        self.bypass_admin = enabled;
        self
    }

    pub fn bypass_authenticated(mut self, enabled: bool) -> Self {
        self.bypass_authenticated = enabled;
        self
    }

    fn total_allowed(&self) -> u32 {
        self.max_requests.saturating_add(self.burst_allowance)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left before the burst region.
    pub remaining: u32,
    /// Nominal per-window limit (`max_requests`).
    pub limit: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
    /// Whole seconds to wait before retrying; set only on denial.
    pub retry_after: Option<u64>,
}

impl RateLimitResult {
    /// Window reset as unix seconds, for the `X-RateLimit-Reset` header.
    pub fn reset_at_unix_secs(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (now + self.reset_after).as_secs_f64().ceil() as u64
    }

    /// Advisory headers for an HTTP-facing wrapper.
    ///
    /// Always carries `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
    /// `X-RateLimit-Reset`; adds `Retry-After` when the request was denied.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(self.limit),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(self.remaining),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(self.reset_at_unix_secs()),
        );
        if let Some(secs) = self.retry_after {
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        headers
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_reset_at: Instant,
    burst_used: u32,
    last_request_at: Instant,
}

impl RateLimitEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.window_reset_at
    }
}

/// In-memory fixed-window limiter for one endpoint.
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self, identifier: &str) -> String {
        format!("{}:{identifier}", self.config.endpoint)
    }

    fn bypasses(&self, is_authenticated: bool, is_admin: bool) -> bool {
        (is_admin && self.config.bypass_admin)
            || (is_authenticated && self.config.bypass_authenticated)
    }

    fn unlimited(&self) -> RateLimitResult {
        RateLimitResult {
            allowed: true,
            remaining: self.config.max_requests,
            limit: self.config.max_requests,
            reset_after: self.config.window,
            retry_after: None,
        }
    }

    /// Check and record a request from `identifier`.
    pub fn check_rate_limit(
        &self,
        identifier: &str,
        is_authenticated: bool,
        is_admin: bool,
    ) -> RateLimitResult {
        if self.bypasses(is_authenticated, is_admin) {
            return self.unlimited();
        }

        let now = Instant::now();
        let cfg = &self.config;
        let key = self.key(identifier);
        let mut entries = self.lock();

        let entry = match entries.get_mut(&key) {
            Some(entry) if !entry.is_expired(now) => entry,
            _ => {
                entries.insert(
                    key,
                    RateLimitEntry {
                        count: 1,
                        window_reset_at: now + cfg.window,
                        burst_used: 0,
                        last_request_at: now,
                    },
                );
                return RateLimitResult {
                    allowed: true,
                    remaining: cfg.max_requests.saturating_sub(1),
                    limit: cfg.max_requests,
                    reset_after: cfg.window,
                    retry_after: None,
                };
            }
        };

        let reset_after = entry.window_reset_at.saturating_duration_since(now);
        if entry.count >= cfg.total_allowed() {
            let retry_after = retry_after_secs(reset_after);
            drop(entries);
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL, "endpoint" => cfg.endpoint.clone())
                .increment(1);
            debug!(
                endpoint = %cfg.endpoint,
                identifier,
                retry_after,
                "rate limit exceeded"
            );
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                limit: cfg.max_requests,
                reset_after,
                retry_after: Some(retry_after),
            };
        }

        entry.count += 1;
        entry.last_request_at = now;
        if entry.count > cfg.max_requests {
            entry.burst_used += 1;
        }

        RateLimitResult {
            allowed: true,
            remaining: cfg.max_requests.saturating_sub(entry.count),
            limit: cfg.max_requests,
            reset_after,
            retry_after: None,
        }
    }

    /// Same computation as [`check_rate_limit`](Self::check_rate_limit)
    /// without recording a request.
    pub fn get_status(
        &self,
        identifier: &str,
        is_authenticated: bool,
        is_admin: bool,
    ) -> RateLimitResult {
        if self.bypasses(is_authenticated, is_admin) {
            return self.unlimited();
        }

        let now = Instant::now();
        let cfg = &self.config;
        let entries = self.lock();
        match entries.get(&self.key(identifier)) {
            Some(entry) if !entry.is_expired(now) => {
                let reset_after = entry.window_reset_at.saturating_duration_since(now);
                let allowed = entry.count < cfg.total_allowed();
                RateLimitResult {
                    allowed,
                    remaining: cfg.max_requests.saturating_sub(entry.count),
                    limit: cfg.max_requests,
                    reset_after,
                    retry_after: (!allowed).then(|| retry_after_secs(reset_after)),
                }
            }
            _ => self.unlimited(),
        }
    }

    /// Burst requests used by `identifier` in its current window.
    pub fn burst_used(&self, identifier: &str) -> Option<u32> {
        let now = Instant::now();
        self.lock()
            .get(&self.key(identifier))
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.burst_used)
    }

    /// Time since `identifier`'s most recent admitted request.
    pub fn idle_for(&self, identifier: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .get(&self.key(identifier))
            .map(|entry| now.saturating_duration_since(entry.last_request_at))
    }

    /// Number of tracked counters, expired ones included until swept.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(endpoint = %self.config.endpoint, removed, "swept expired rate limit entries");
        }
        removed
    }

    /// Drop all counters.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match limiter.upgrade() {
                    Some(limiter) => {
                        limiter.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}

fn retry_after_secs(reset_after: Duration) -> u64 {
    crate::error::retry_after_secs(Some(&reset_after))
}
