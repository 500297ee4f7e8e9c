//! Builder for configuring governed advisors

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::GovernedAdvisor;
use crate::advisor::{ApiClient, ApiClientConfig, FinancialAdvisor};
use crate::cache::{CacheConfig, MemoryCache};
use crate::capacity::CapacityPlanner;
use crate::config::Config;
use crate::queue::{QueueConfig, RequestQueue};
use crate::rate_limit::{DEFAULT_SWEEP_INTERVAL, RateLimitConfig, RateLimiter};
use crate::retry::RetryConfig;
use crate::{Result, SmartSpendError};

/// Main entry point for creating governed advisors.
pub struct SmartSpend;

impl SmartSpend {
    /// Create a new builder for configuring the advisor.
    pub fn builder() -> SmartSpendBuilder {
        SmartSpendBuilder::new()
    }
}

/// Builder for configuring [`GovernedAdvisor`] instances.
///
/// ```rust,no_run
/// # use smartspend::{ApiClientConfig, RateLimitConfig, SmartSpend};
/// # fn main() -> smartspend::Result<()> {
/// let advisor = SmartSpend::builder()
///     .api(ApiClientConfig::new("https://app.example.com"))
///     .rate_limit(RateLimitConfig::ai())
///     .admin("ops-user")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SmartSpendBuilder {
    advisor: Option<Arc<dyn FinancialAdvisor>>,
    api: Option<ApiClientConfig>,
    rate_limit: RateLimitConfig,
    queue: QueueConfig,
    retry: RetryConfig,
    cache: CacheConfig,
    admin_ids: HashSet<String>,
    planner: Option<Arc<CapacityPlanner>>,
    sweep_interval: Duration,
}

impl Default for SmartSpendBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmartSpendBuilder {
    pub fn new() -> Self {
        Self {
            advisor: None,
            api: None,
            rate_limit: RateLimitConfig::ai(),
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            admin_ids: HashSet::new(),
            planner: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Govern an existing advisor instead of building an [`ApiClient`].
    pub fn advisor(mut self, advisor: Arc<dyn FinancialAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Build an [`ApiClient`] from `config` as the inner advisor.
    pub fn api(mut self, config: ApiClientConfig) -> Self {
        self.api = Some(config);
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn queue(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Treat `user_id` as an admin when checking rate limits.
    pub fn admin(mut self, user_id: impl Into<String>) -> Self {
        self.admin_ids.insert(user_id.into());
        self
    }

    /// Share a capacity planner with other components.
    pub fn planner(mut self, planner: Arc<CapacityPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Interval between limiter sweeps. `Duration::ZERO` disables sweeping.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Apply every section of a loaded [`Config`].
    pub fn from_config(mut self, config: &Config) -> Self {
        self.api = Some(config.api_client());
        self.rate_limit = config.rate_limit();
        self.queue = config.queue();
        self.retry = config.retry();
        self.cache = config.cache();
        self.admin_ids.extend(config.admin_ids());
        self.sweep_interval = config.sweep_interval();
        self
    }

    /// Build the governed advisor.
    ///
    /// The limiter sweeper starts only when called inside a tokio runtime.
    pub fn build(self) -> Result<GovernedAdvisor> {
        let inner: Arc<dyn FinancialAdvisor> = match (self.advisor, self.api) {
            (Some(advisor), _) => advisor,
            (None, Some(api)) => Arc::new(ApiClient::new(api)?),
            (None, None) => {
                return Err(SmartSpendError::Configuration(
                    "No advisor configured. Call .api() or .advisor() on the builder.".into(),
                ));
            }
        };

        let limiter = Arc::new(RateLimiter::new(self.rate_limit));
        let sweeper = if self.sweep_interval.is_zero()
            || tokio::runtime::Handle::try_current().is_err()
        {
            None
        } else {
            Some(limiter.spawn_sweeper(self.sweep_interval))
        };

        debug!(
            advisor = inner.name(),
            concurrency = self.queue.concurrency,
            sweeper = sweeper.is_some(),
            "built governed advisor"
        );

        Ok(GovernedAdvisor {
            inner,
            limiter,
            queue: RequestQueue::new(self.queue),
            retry: self.retry,
            cache_ttl: self.cache.ttl,
            cache: Arc::new(MemoryCache::new(&self.cache)),
            planner: self.planner.unwrap_or_default(),
            admin_ids: self.admin_ids,
            sweeper,
        })
    }
}
