//! Request and response payloads for the AI endpoints

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which insight-producing endpoint a list of insights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Financial,
    Budget,
    Spending,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Financial => "financial",
            InsightKind::Budget => "budget",
            InsightKind::Spending => "spending",
        }
    }
}

/// A single generated insight.
///
/// Endpoints are loosely specified, so every field tolerates absence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// e.g. "warning", "tip", "achievement", "prediction".
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl Insight {
    pub fn new(
        kind: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }
}

/// Context sent to the financial coach endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Additional free-form context (recent spending, goals, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Figures sent to the risk analysis endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_expenses: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_debt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_savings: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FinancialData {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn monthly_income(mut self, amount: f64) -> Self {
        self.monthly_income = Some(amount);
        self
    }

    pub fn monthly_expenses(mut self, amount: f64) -> Self {
        self.monthly_expenses = Some(amount);
        self
    }

    pub fn total_debt(mut self, amount: f64) -> Self {
        self.total_debt = Some(amount);
        self
    }

    pub fn total_savings(mut self, amount: f64) -> Self {
        self.total_savings = Some(amount);
        self
    }
}

/// Result of the risk analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub risk_predictions: String,
    pub health_score: f64,
}
