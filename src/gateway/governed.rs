//! Advisor decorator applying request governance.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::advisor::{FinancialAdvisor, Operation};
use crate::cache::{MemoryCache, cache_key};
use crate::capacity::{self, CapacityPlanner};
use crate::queue::RequestQueue;
use crate::rate_limit::{RateLimitResult, RateLimiter};
use crate::retry::{self, RetryConfig};
use crate::types::{
    ApiResponse, FinancialData, Insight, InsightKind, RiskAnalysis, UserContext, Validate,
};

/// A [`FinancialAdvisor`] that applies caching, rate limiting, queueing
/// and retry around an inner advisor.
///
/// Per call, in order: insight operations are served from the memory
/// cache when fresh; the caller's user id is checked against the rate
/// limiter (denials come back as a failed response with `retry_after`);
/// the call waits for a queue slot; failures are retried with linear
/// backoff; successful insights are cached. Every dispatched call records
/// `responseTime` and `errorRate` samples with the capacity planner.
///
/// Created with [`SmartSpend::builder()`](crate::SmartSpend::builder).
pub struct GovernedAdvisor {
    pub(crate) inner: Arc<dyn FinancialAdvisor>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) queue: RequestQueue,
    pub(crate) retry: RetryConfig,
    pub(crate) cache: Arc<MemoryCache<Vec<Insight>>>,
    pub(crate) cache_ttl: Duration,
    pub(crate) planner: Arc<CapacityPlanner>,
    pub(crate) admin_ids: HashSet<String>,
    pub(crate) sweeper: Option<JoinHandle<()>>,
}

impl GovernedAdvisor {
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn planner(&self) -> &Arc<CapacityPlanner> {
        &self.planner
    }

    pub fn cache(&self) -> &Arc<MemoryCache<Vec<Insight>>> {
        &self.cache
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_ids.contains(user_id)
    }

    /// Current limiter status for `user_id`, without recording a request.
    pub fn rate_limit_status(&self, user_id: &str) -> RateLimitResult {
        self.limiter.get_status(user_id, true, self.is_admin(user_id))
    }

    /// Run `call` against the inner advisor under rate limiting, queueing
    /// and retry.
    async fn dispatch<T, F, Fut>(
        &self,
        operation: Operation,
        user_id: &str,
        call: F,
    ) -> ApiResponse<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn FinancialAdvisor>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResponse<T>> + Send + 'static,
    {
        let decision = self
            .limiter
            .check_rate_limit(user_id, true, self.is_admin(user_id));
        if !decision.allowed {
            let retry_after = decision.retry_after.unwrap_or(1);
            debug!(
                operation = operation.as_str(),
                user_id, retry_after, "AI call rate limited"
            );
            return ApiResponse::rate_limited(retry_after);
        }

        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let retry_config = self.retry.clone();
        let result = self
            .queue
            .add(move || async move {
                retry::with_retry(&retry_config, operation.as_str(), || {
                    let response = call(Arc::clone(&inner));
                    async move { response.await.into_result() }
                })
                .await
            })
            .await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.planner.record_metric(capacity::RESPONSE_TIME, elapsed_ms);
        self.planner.record_metric(
            capacity::ERROR_RATE,
            if result.is_ok() { 0.0 } else { 100.0 },
        );

        result.into()
    }

    async fn governed_insights(
        &self,
        kind: InsightKind,
        user_id: &str,
    ) -> ApiResponse<Vec<Insight>> {
        if let Some(rejected) = ApiResponse::from_validation(user_id.validate()) {
            return rejected;
        }
        let operation = Operation::for_insights(kind);
        let key = cache_key(operation.as_str(), &[user_id]);
        if let Some(hit) = self.cache.get(&key) {
            debug!(
                operation = operation.as_str(),
                user_id, "serving insights from memory cache"
            );
            return ApiResponse::ok(hit);
        }

        let user = user_id.to_string();
        let response = self
            .dispatch(operation, user_id, move |advisor| {
                let user = user.clone();
                async move { advisor.insights(kind, &user).await }
            })
            .await;

        if let Some(data) = response.data.as_ref().filter(|_| response.success) {
            self.cache.set(key, data.clone(), self.cache_ttl);
        }
        response
    }
}

#[async_trait]
impl FinancialAdvisor for GovernedAdvisor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_financial_insights(&self, user_id: &str) -> ApiResponse<Vec<Insight>> {
        self.governed_insights(InsightKind::Financial, user_id).await
    }

    async fn generate_budget_recommendations(&self, user_id: &str) -> ApiResponse<Vec<Insight>> {
        self.governed_insights(InsightKind::Budget, user_id).await
    }

    async fn generate_spending_predictions(&self, user_id: &str) -> ApiResponse<Vec<Insight>> {
        self.governed_insights(InsightKind::Spending, user_id).await
    }

    async fn get_financial_advice(&self, context: &UserContext) -> ApiResponse<String> {
        if let Some(rejected) = ApiResponse::from_validation(context.validate()) {
            return rejected;
        }
        let context = context.clone();
        let user_id = context.user_id.clone();
        self.dispatch(Operation::FinancialAdvice, &user_id, move |advisor| {
            let context = context.clone();
            async move { advisor.get_financial_advice(&context).await }
        })
        .await
    }

    async fn analyze_financial_risk(&self, data: &FinancialData) -> ApiResponse<RiskAnalysis> {
        if let Some(rejected) = ApiResponse::from_validation(data.validate()) {
            return rejected;
        }
        let data = data.clone();
        let user_id = data.user_id.clone();
        self.dispatch(Operation::RiskAnalysis, &user_id, move |advisor| {
            let data = data.clone();
            async move { advisor.analyze_financial_risk(&data).await }
        })
        .await
    }
}

impl Drop for GovernedAdvisor {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
