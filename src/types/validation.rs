//! Field-level validation of AI request inputs.
//!
//! Runs before any network call; a non-empty error list short-circuits the
//! request with a failed [`ApiResponse`](super::ApiResponse).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{FinancialData, UserContext};

/// Maximum accepted length of a user identifier.
pub const MAX_USER_ID_LEN: usize = 128;

/// Maximum accepted length of a coaching question.
pub const MAX_QUESTION_LEN: usize = 2000;

/// A validation failure on a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Inputs that can be checked before they leave the process.
pub trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

impl Validate for str {
    /// Treats the string as a user identifier.
    fn validate(&self) -> Vec<FieldError> {
        validate_user_id(self)
    }
}

impl Validate for UserContext {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = validate_user_id(&self.user_id);
        if let Some(q) = &self.question {
            if q.trim().is_empty() {
                errors.push(FieldError::new("question", "must not be blank"));
            } else if q.chars().count() > MAX_QUESTION_LEN {
                errors.push(FieldError::new(
                    "question",
                    format!("must be at most {MAX_QUESTION_LEN} characters"),
                ));
            }
        }
        errors
    }
}

impl Validate for FinancialData {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = validate_user_id(&self.user_id);
        let amounts = [
            ("monthlyIncome", self.monthly_income),
            ("monthlyExpenses", self.monthly_expenses),
            ("totalDebt", self.total_debt),
            ("totalSavings", self.total_savings),
        ];
        for (field, value) in amounts {
            if let Some(v) = value {
                if !v.is_finite() {
                    errors.push(FieldError::new(field, "must be a finite number"));
                } else if v < 0.0 {
                    errors.push(FieldError::new(field, "must not be negative"));
                }
            }
        }
        errors
    }
}

fn validate_user_id(user_id: &str) -> Vec<FieldError> {
    if user_id.trim().is_empty() {
        vec![FieldError::new("userId", "must not be empty")]
    } else if user_id.chars().count() > MAX_USER_ID_LEN {
        vec![FieldError::new(
            "userId",
            format!("must be at most {MAX_USER_ID_LEN} characters"),
        )]
    } else {
        Vec::new()
    }
}
