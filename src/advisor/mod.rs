//! AI endpoint access.
//!
//! [`FinancialAdvisor`] is the seam between callers and the endpoints.
//! [`ApiClient`] talks HTTP; the [`GovernedAdvisor`](crate::GovernedAdvisor)
//! decorator layers caching, rate limiting, queueing and retry on top of
//! any advisor.

pub mod client;
pub mod fallback;
pub mod traits;

pub use client::{ApiClient, ApiClientConfig};
pub use traits::{FinancialAdvisor, Operation};
