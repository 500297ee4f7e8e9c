//! The advisor trait implemented by the HTTP client and its decorators.

use async_trait::async_trait;

use crate::types::{ApiResponse, FinancialData, Insight, InsightKind, RiskAnalysis, UserContext};

/// An AI endpoint operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FinancialInsights,
    BudgetRecommendations,
    SpendingPredictions,
    FinancialAdvice,
    RiskAnalysis,
}

impl Operation {
    /// Name used in metric labels, log fields and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FinancialInsights => "generate_financial_insights",
            Operation::BudgetRecommendations => "generate_budget_recommendations",
            Operation::SpendingPredictions => "generate_spending_predictions",
            Operation::FinancialAdvice => "get_financial_advice",
            Operation::RiskAnalysis => "analyze_financial_risk",
        }
    }

    /// Endpoint path relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::FinancialInsights => "/api/generate-insights",
            Operation::BudgetRecommendations => "/api/budget-recommendations",
            Operation::SpendingPredictions => "/api/spending-predictions",
            Operation::FinancialAdvice => "/api/financial-coach",
            Operation::RiskAnalysis => "/api/risk-analysis",
        }
    }

    pub fn for_insights(kind: InsightKind) -> Self {
        match kind {
            InsightKind::Financial => Operation::FinancialInsights,
            InsightKind::Budget => Operation::BudgetRecommendations,
            InsightKind::Spending => Operation::SpendingPredictions,
        }
    }
}

/// Source of AI-generated financial guidance.
///
/// Implementations never fail with `Err`: every failure is reported in the
/// returned [`ApiResponse`].
#[async_trait]
pub trait FinancialAdvisor: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    async fn generate_financial_insights(&self, user_id: &str) -> ApiResponse<Vec<Insight>>;

    async fn generate_budget_recommendations(&self, user_id: &str) -> ApiResponse<Vec<Insight>>;

    async fn generate_spending_predictions(&self, user_id: &str) -> ApiResponse<Vec<Insight>>;

    async fn get_financial_advice(&self, context: &UserContext) -> ApiResponse<String>;

    async fn analyze_financial_risk(&self, data: &FinancialData) -> ApiResponse<RiskAnalysis>;

    /// Dispatch to the insight operation for `kind`.
    async fn insights(&self, kind: InsightKind, user_id: &str) -> ApiResponse<Vec<Insight>> {
        match kind {
            InsightKind::Financial => self.generate_financial_insights(user_id).await,
            InsightKind::Budget => self.generate_budget_recommendations(user_id).await,
            InsightKind::Spending => self.generate_spending_predictions(user_id).await,
        }
    }
}
