//! SmartSpend - request governance for the AI finance endpoints
//!
//! This crate wraps the SmartSpend AI endpoints (insights, budget
//! recommendations, spending predictions, coaching, risk analysis) with
//! the controls a client needs in front of a rate-limited, slow upstream:
//! fixed-window rate limiting with burst allowance, a bounded-concurrency
//! request queue, in-memory and durable TTL caches, linear-backoff retry
//! and advisory capacity planning.
//!
//! # Example
//!
//! ```rust,no_run
//! use smartspend::{ApiClientConfig, FinancialAdvisor, InsightKind, SmartSpend, fallback};
//!
//! #[tokio::main]
//! async fn main() -> smartspend::Result<()> {
//!     let advisor = SmartSpend::builder()
//!         .api(ApiClientConfig::new("https://app.example.com"))
//!         .build()?;
//!
//!     let insights = advisor
//!         .generate_budget_recommendations("user-42")
//!         .await
//!         .or_else_data(|| fallback::fallback_insights(InsightKind::Budget));
//!
//!     for insight in insights {
//!         println!("{}: {}", insight.title, insight.description);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Every advisor call returns an [`ApiResponse`]; failures never surface
//! as `Err`.

pub mod advisor;
pub mod cache;
pub mod capacity;
pub mod config;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod shaping;
pub mod telemetry;
pub mod types;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use advisor::{ApiClient, ApiClientConfig, FinancialAdvisor, Operation, fallback};
pub use cache::{CacheConfig, LocalCache, MemoryCache};
pub use capacity::{CapacityAnalysis, CapacityPlanner, ScalingDirection, Trend};
pub use config::Config;
pub use error::{Result, SmartSpendError};
pub use gateway::{GovernedAdvisor, SmartSpend, SmartSpendBuilder};
pub use queue::{QueueConfig, RequestQueue};
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use retry::{RetryConfig, with_linear_retry, with_retry};
pub use shaping::{Debouncer, Throttler};

pub use types::{
    ApiResponse, FieldError, FinancialData, Insight, InsightKind, RiskAnalysis, UserContext,
    Validate,
};
