//! Uniform response envelope for AI endpoint calls

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::FieldError;
use crate::error::retry_after_secs;
use crate::{Result, SmartSpendError};

/// Outcome of an AI endpoint call.
///
/// Every failure mode (network, timeout, non-2xx, undecodable body, rate
/// limit, validation) is normalised into `error`; callers never see an
/// `Err` from the advisor methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds until a rate-limited caller may retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// HTTP status of an upstream error response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            retry_after: None,
            status: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            retry_after: None,
            status: None,
        }
    }

    /// A soft denial with a retry hint (seconds).
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::failure(format!(
                "Rate limit exceeded. Try again in {retry_after} seconds."
            ))
        }
    }

    /// Normalise an error into a failed response.
    pub fn from_error(err: &SmartSpendError) -> Self {
        match err {
            SmartSpendError::RateLimited { retry_after } => {
                Self::rate_limited(retry_after_secs(retry_after.as_ref()))
            }
            SmartSpendError::Api { status, message } => Self {
                status: Some(*status),
                ..Self::failure(message.clone())
            },
            other => Self::failure(other.to_string()),
        }
    }

    /// A failed response for validation errors, or `None` when there are none.
    pub fn from_validation(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self::from_error(&SmartSpendError::Validation(errors)))
        }
    }

    pub fn is_success(&self) -> bool {
        self.success && self.data.is_some()
    }

    /// The error text, or an empty string on success.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            retry_after: self.retry_after,
            status: self.status,
        }
    }

    /// Lift into a `Result`.
    ///
    /// A retry hint becomes `RateLimited` and an upstream status becomes
    /// `Api`, so retry classification survives the round trip. Any other
    /// failure becomes [`SmartSpendError::Failed`].
    pub fn into_result(self) -> Result<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => {
                let message = self.error.unwrap_or_else(missing_error);
                Err(match (self.retry_after, self.status) {
                    (Some(secs), _) => SmartSpendError::RateLimited {
                        retry_after: Some(Duration::from_secs(secs)),
                    },
                    (None, Some(status)) => SmartSpendError::Api { status, message },
                    (None, None) => SmartSpendError::Failed(message),
                })
            }
        }
    }

    /// Lift into a `Result`, keeping the error text verbatim as
    /// [`SmartSpendError::Failed`].
    pub fn into_failed_result(self) -> Result<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(SmartSpendError::Failed(
                self.error.unwrap_or_else(missing_error),
            )),
        }
    }

    /// Take the data, or compute a substitute when the call failed.
    pub fn or_else_data(self, fallback: impl FnOnce() -> T) -> T {
        match (self.success, self.data) {
            (true, Some(data)) => data,
            _ => fallback(),
        }
    }
}

fn missing_error() -> String {
    "request failed without an error message".into()
}

impl<T> From<Result<T>> for ApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
