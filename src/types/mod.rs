//! Public types for the SmartSpend API.

mod insight;
mod response;
mod validation;

pub use insight::{FinancialData, Insight, InsightKind, RiskAnalysis, UserContext};
pub use response::ApiResponse;
pub use validation::{FieldError, MAX_QUESTION_LEN, MAX_USER_ID_LEN, Validate};
