//! Bounded-concurrency FIFO admission for outbound calls.
//!
//! [`RequestQueue::add`] appends a task to the backlog and starts as many
//! tasks as the concurrency ceiling allows. When a task finishes its slot
//! is released and, after the minimum dispatch delay, the backlog is
//! drained again.
//!
//! A task's error goes only to its own caller. Tasks that have been
//! submitted cannot be cancelled; dropping the returned future only
//! discards the result.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::trace;

use crate::telemetry;
use crate::{Result, SmartSpendError};

/// Configuration for a [`RequestQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum simultaneously running tasks. Default: 3.
    pub concurrency: usize,
    /// Pause after a task completes before the next dispatch. Default: 100ms.
    pub min_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            min_delay: Duration::from_millis(100),
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct State {
    backlog: VecDeque<Job>,
    in_flight: usize,
}

struct Shared {
    config: QueueConfig,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start backlog tasks while slots are free.
    fn drain(self: &Arc<Self>) {
        let mut state = self.lock();
        while state.in_flight < self.config.concurrency {
            let Some(job) = state.backlog.pop_front() else {
                break;
            };
            state.in_flight += 1;
            let slot = Slot {
                shared: Arc::clone(self),
            };
            tokio::spawn(async move {
                let _slot = slot;
                job().await;
            });
        }
        record_gauges(&state);
    }
}

/// Releases a concurrency slot when a task finishes, even by panic.
struct Slot {
    shared: Arc<Shared>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            record_gauges(&state);
        }
        let shared = Arc::clone(&self.shared);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                tokio::time::sleep(shared.config.min_delay).await;
                shared.drain();
            });
        }
    }
}

fn record_gauges(state: &State) {
    metrics::gauge!(telemetry::QUEUE_PENDING).set(state.backlog.len() as f64);
    metrics::gauge!(telemetry::QUEUE_IN_FLIGHT).set(state.in_flight as f64);
}

/// FIFO admission controller with a concurrency ceiling.
///
/// Cheap to clone; clones share the same backlog.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl RequestQueue {
    pub fn new(config: QueueConfig) -> Self {
        let config = QueueConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    backlog: VecDeque::new(),
                    in_flight: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Submit `task` and wait for its result.
    ///
    /// The task joins the backlog immediately, before the returned future
    /// is polled, so submission order is call order.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn add<F, Fut, T>(&self, task: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                // Receiver gone means the caller stopped waiting.
                let _ = tx.send(task().await);
            })
        });

        {
            let mut state = self.shared.lock();
            state.backlog.push_back(job);
            trace!(pending = state.backlog.len(), "task queued");
        }
        self.shared.drain();

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(SmartSpendError::QueueClosed),
            }
        }
    }

    /// Tasks waiting for a slot.
    pub fn pending(&self) -> usize {
        self.shared.lock().backlog.len()
    }

    /// Tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
