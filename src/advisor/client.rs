//! HTTP client for the serverless AI endpoints.
//!
//! Each operation is a single JSON POST. Responses are normalised into
//! [`ApiResponse`]: network errors, timeouts, non-2xx statuses and
//! undecodable bodies all land in `error`.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::traits::{FinancialAdvisor, Operation};
use crate::cache::LocalCache;
use crate::retry::{self, RetryConfig};
use crate::telemetry;
use crate::types::{ApiResponse, FinancialData, Insight, RiskAnalysis, UserContext, Validate};
use crate::{Result, SmartSpendError};

/// Default base URL for the AI endpoints.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix for the client's durable response cache records.
const API_CACHE_PREFIX: &str = "smartspend_api_";

/// Configuration for an [`ApiClient`].
///
/// ```rust
/// # use smartspend::ApiClientConfig;
/// # use std::time::Duration;
/// let config = ApiClientConfig::new("https://app.example.com")
///     .timeout(Duration::from_secs(5));
/// assert_eq!(config.base_url, "https://app.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    /// Per-request timeout. Default: 10s.
    pub timeout: Duration,
    /// Sent as a bearer token when present.
    pub auth_token: Option<String>,
    /// Directory for the durable response cache.
    pub cache_dir: PathBuf,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            auth_token: None,
            cache_dir: LocalCache::default_dir(),
        }
    }
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserContextBody<'a> {
    user_context: &'a UserContext,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinancialDataBody<'a> {
    financial_data: &'a FinancialData,
}

#[derive(Deserialize)]
struct InsightsBody {
    #[serde(default)]
    insights: Vec<Insight>,
}

#[derive(Deserialize)]
struct AdviceBody {
    advice: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Typed client for the AI endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    auth_token: Option<String>,
    cache: LocalCache,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self> {
        let http = Client::builder().build().map_err(|e| {
            SmartSpendError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            auth_token: config.auth_token,
            cache: LocalCache::with_prefix(config.cache_dir, API_CACHE_PREFIX),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The durable cache used by [`with_cache`](Self::with_cache).
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    async fn post<B, R>(&self, operation: Operation, body: &B) -> ApiResponse<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.send(operation, body).await;
        let status = if result.is_ok() { "ok" } else { "error" };

        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "operation" => operation.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "operation" => operation.as_str(),
        )
        .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            debug!(operation = operation.as_str(), error = %e, "AI request failed");
        }
        result.into()
    }

    async fn send<B, R>(&self, operation: Operation, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, operation.path());
        let mut request = self.http.post(&url).timeout(self.timeout).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(SmartSpendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_insights(
        &self,
        operation: Operation,
        user_id: &str,
    ) -> ApiResponse<Vec<Insight>> {
        if let Some(rejected) = ApiResponse::from_validation(user_id.validate()) {
            return rejected;
        }
        self.post::<_, InsightsBody>(operation, &UserIdBody { user_id })
            .await
            .map(|body| body.insights)
    }

    /// Re-invoke `api_call` up to `max_retries` times, waiting
    /// `delay * attempt` between attempts.
    ///
    /// Every failure is retried and retry hints are ignored. Returns the
    /// first successful response. Once every attempt has failed, the error
    /// reads `Failed after <n> attempts: <last error>` with the last
    /// response's error text.
    pub async fn with_retry<F, Fut, T>(
        api_call: F,
        max_retries: u32,
        delay: Duration,
    ) -> ApiResponse<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResponse<T>>,
    {
        let config = RetryConfig::new().max_attempts(max_retries).delay(delay);
        retry::with_linear_retry(&config, "api_call", || {
            let call = api_call();
            async move { call.await.into_failed_result() }
        })
        .await
        .into()
    }

    /// Serve `cache_key` from the durable cache while fresh; otherwise run
    /// `api_call` and persist a successful response for `ttl`.
    pub async fn with_cache<F, Fut, T>(
        &self,
        cache_key: &str,
        api_call: F,
        ttl: Duration,
    ) -> ApiResponse<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResponse<T>>,
        T: Serialize + DeserializeOwned,
    {
        if let Some(data) = self.cache.get::<T>(cache_key) {
            debug!(cache_key, "serving AI response from durable cache");
            return ApiResponse::ok(data);
        }
        let response = api_call().await;
        if response.success {
            if let Some(data) = &response.data {
                self.cache.set(cache_key, data, ttl);
            }
        }
        response
    }
}

#[async_trait]
impl FinancialAdvisor for ApiClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate_financial_insights(&self, user_id: &str) -> ApiResponse<Vec<Insight>> {
        self.fetch_insights(Operation::FinancialInsights, user_id).await
    }

    async fn generate_budget_recommendations(&self, user_id: &str) -> ApiResponse<Vec<Insight>> {
        self.fetch_insights(Operation::BudgetRecommendations, user_id).await
    }

    async fn generate_spending_predictions(&self, user_id: &str) -> ApiResponse<Vec<Insight>> {
        self.fetch_insights(Operation::SpendingPredictions, user_id).await
    }

    async fn get_financial_advice(&self, context: &UserContext) -> ApiResponse<String> {
        if let Some(rejected) = ApiResponse::from_validation(context.validate()) {
            return rejected;
        }
        self.post::<_, AdviceBody>(
            Operation::FinancialAdvice,
            &UserContextBody {
                user_context: context,
            },
        )
        .await
        .map(|body| body.advice)
    }

    async fn analyze_financial_risk(&self, data: &FinancialData) -> ApiResponse<RiskAnalysis> {
        if let Some(rejected) = ApiResponse::from_validation(data.validate()) {
            return rejected;
        }
        self.post(
            Operation::RiskAnalysis,
            &FinancialDataBody {
                financial_data: data,
            },
        )
        .await
    }
}

fn map_transport_error(e: reqwest::Error) -> SmartSpendError {
    if e.is_timeout() {
        SmartSpendError::Timeout
    } else {
        SmartSpendError::Http(e.to_string())
    }
}
