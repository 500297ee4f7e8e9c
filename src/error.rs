//! SmartSpend error types

use std::time::Duration;

use crate::types::FieldError;

/// SmartSpend error types
#[derive(Debug, thiserror::Error)]
pub enum SmartSpendError {
    // Network errors
    #[error("Network error: {0}")]
    Http(String),

    #[error("Request timeout")]
    Timeout,

    #[error("{message}")]
    Api { status: u16, message: String },

    /// A failed [`ApiResponse`](crate::ApiResponse) lifted into a `Result`.
    #[error("{0}")]
    Failed(String),

    // Governance errors
    #[error("Rate limit exceeded. Try again in {} seconds.", retry_after_secs(.retry_after.as_ref()))]
    RateLimited { retry_after: Option<Duration> },

    #[error("request queue closed before the task completed")]
    QueueClosed,

    // Data errors
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache error: {0}")]
    Cache(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Whole seconds a caller should wait, rounded up and at least 1.
pub(crate) fn retry_after_secs(retry_after: Option<&Duration>) -> u64 {
    retry_after.map_or(1, |d| (d.as_secs_f64().ceil() as u64).max(1))
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl SmartSpendError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Network failures, timeouts, rate limits and 5xx responses are
    /// transient. Validation, decoding and configuration errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            SmartSpendError::Http(_)
            | SmartSpendError::Failed(_)
            | SmartSpendError::Timeout
            | SmartSpendError::RateLimited { .. } => true,
            SmartSpendError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SmartSpendError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for SmartSpend operations
pub type Result<T> = std::result::Result<T, SmartSpendError>;
