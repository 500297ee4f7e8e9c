//! Static content shown when an AI call fails.
//!
//! Callers typically combine these with
//! [`ApiResponse::or_else_data`](crate::ApiResponse::or_else_data):
//!
//! ```rust
//! # use smartspend::{ApiResponse, Insight, InsightKind, fallback};
//! let response: ApiResponse<Vec<Insight>> = ApiResponse::failure("Request timeout");
//! let insights = response.or_else_data(|| fallback::fallback_insights(InsightKind::Budget));
//! assert!(!insights.is_empty());
//! ```

use crate::types::{Insight, InsightKind};

/// Generic insights for `kind`, independent of the user's data.
pub fn fallback_insights(kind: InsightKind) -> Vec<Insight> {
    match kind {
        InsightKind::Financial => vec![
            Insight::new(
                "tip",
                "Track every expense",
                "Recording each transaction for a month shows where money actually goes.",
            )
            .priority("medium"),
            Insight::new(
                "tip",
                "Build an emergency fund",
                "Aim for three to six months of essential expenses in an easy-access account.",
            )
            .priority("high"),
        ],
        InsightKind::Budget => vec![
            Insight::new(
                "recommendation",
                "Try the 50/30/20 rule",
                "Split income into 50% needs, 30% wants and 20% savings or debt repayment.",
            )
            .priority("medium"),
            Insight::new(
                "recommendation",
                "Review subscriptions",
                "Cancel recurring services you have not used in the last month.",
            )
            .priority("low"),
        ],
        InsightKind::Spending => vec![
            Insight::new(
                "prediction",
                "Spending follows habits",
                "Next month's spending is usually close to this month's; plan for similar totals.",
            )
            .priority("low"),
        ],
    }
}

/// Canned coaching advice chosen by keyword in the user's question.
pub fn fallback_advice(question: Option<&str>) -> String {
    let question = question.unwrap_or_default().to_lowercase();
    let advice = if question.contains("debt") {
        "Pay the minimum on every debt, then put any extra toward the highest-interest \
         balance first. Avoid taking on new debt while you pay it down."
    } else if question.contains("saving") || question.contains("save") {
        "Automate a transfer to savings on payday so saving happens before spending. \
         Even a small fixed amount builds the habit."
    } else if question.contains("budget") {
        "Start from last month's spending, set a limit for each category, and check \
         progress weekly rather than at the end of the month."
    } else if question.contains("invest") {
        "Before investing, keep an emergency fund and clear high-interest debt. Then \
         favour low-cost, diversified funds held for the long term."
    } else {
        "Review your income and expenses each month, keep an emergency fund, and set \
         one concrete savings goal to work toward."
    };
    advice.to_string()
}
