//! Call-rate shapers for caller-triggered operations.
//!
//! - [`Debouncer`]: trailing edge: runs the most recent call once the
//!   caller has been quiet for the delay.
//! - [`Throttler`]: leading edge: admits at most one call per interval.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debouncer.
///
/// Each [`call`](Self::call) supersedes the previous pending one.
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `f` to run after the delay unless another call arrives first.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn call<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == ticket {
                f().await;
            }
        });
    }

    /// Drop the pending call, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Leading-edge throttle.
pub struct Throttler {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Admit the caller if at least `interval` has passed since the last
    /// admission.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(prev) if now.saturating_duration_since(prev) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Run `f` if admitted.
    pub fn call<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.try_acquire().then(f)
    }

    /// Forget the last admission.
    pub fn reset(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
