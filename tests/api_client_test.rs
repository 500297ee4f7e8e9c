//! HTTP client against a mock AI backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smartspend::{
    ApiClient, ApiClientConfig, ApiResponse, FinancialAdvisor, FinancialData, Insight,
    InsightKind, QueueConfig, RetryConfig, SmartSpend, UserContext,
};

fn client(server: &MockServer, cache_dir: &std::path::Path) -> ApiClient {
    ApiClient::new(ApiClientConfig::new(server.uri()).cache_dir(cache_dir)).unwrap()
}

fn insights_body() -> serde_json::Value {
    json!({
        "insights": [
            {"type": "warning", "title": "Dining out", "description": "Up 40% this month",
             "priority": "high", "category": "food", "amount": 312.5},
            {"type": "tip", "title": "Round-ups", "description": "Save spare change"}
        ]
    })
}

#[tokio::test]
async fn financial_insights_posts_user_id() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/generate-insights"))
        .and(body_json(json!({"userId": "u1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(insights_body()))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server, dir.path())
        .generate_financial_insights("u1")
        .await;

    assert!(response.is_success(), "{:?}", response.error);
    let insights = response.data.unwrap();
    assert_eq!(insights.len(), 2);
    assert_eq!(insights[0].kind, "warning");
    assert_eq!(insights[0].priority.as_deref(), Some("high"));
    assert_eq!(insights[0].amount, Some(312.5));
    assert_eq!(insights[1].category, None);
}

#[tokio::test]
async fn each_insight_kind_uses_its_endpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    for endpoint in [
        "/api/generate-insights",
        "/api/budget-recommendations",
        "/api/spending-predictions",
    ] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "insights": [{"type": "tip", "title": endpoint, "description": ""}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client(&server, dir.path());
    for (kind, endpoint) in [
        (InsightKind::Financial, "/api/generate-insights"),
        (InsightKind::Budget, "/api/budget-recommendations"),
        (InsightKind::Spending, "/api/spending-predictions"),
    ] {
        let insights = client.insights(kind, "u1").await.into_result().unwrap();
        assert_eq!(insights[0].title, endpoint);
    }
}

#[tokio::test]
async fn missing_insights_field_is_empty_list() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/spending-predictions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let response = client(&server, dir.path())
        .generate_spending_predictions("u1")
        .await;
    assert_eq!(response.data, Some(Vec::<Insight>::new()));
}

#[tokio::test]
async fn financial_advice_sends_user_context() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/financial-coach"))
        .and(body_json(json!({
            "userContext": {"userId": "u1", "question": "How do I save?", "goal": "house"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"advice": "Automate it."})))
        .expect(1)
        .mount(&server)
        .await;

    let context = UserContext::new("u1")
        .question("How do I save?")
        .with("goal", "house");
    let response = client(&server, dir.path())
        .get_financial_advice(&context)
        .await;
    assert_eq!(response.data.as_deref(), Some("Automate it."));
}

#[tokio::test]
async fn risk_analysis_sends_financial_data() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/risk-analysis"))
        .and(body_json(json!({
            "financialData": {"userId": "u1", "monthlyIncome": 5000.0, "totalDebt": 1200.0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "riskPredictions": "Low risk", "healthScore": 82.5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = FinancialData::new("u1")
        .monthly_income(5000.0)
        .total_debt(1200.0);
    let analysis = client(&server, dir.path())
        .analyze_financial_risk(&data)
        .await
        .into_result()
        .unwrap();
    assert_eq!(analysis.risk_predictions, "Low risk");
    assert_eq!(analysis.health_score, 82.5);
}

#[tokio::test]
async fn bearer_token_is_sent() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(insights_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(
        ApiClientConfig::new(server.uri())
            .auth_token("secret-token")
            .cache_dir(dir.path()),
    )
    .unwrap();
    assert!(client.generate_financial_insights("u1").await.is_success());
}

#[tokio::test]
async fn error_field_becomes_message() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Model overloaded"})),
        )
        .mount(&server)
        .await;

    let response = client(&server, dir.path())
        .generate_budget_recommendations("u1")
        .await;
    assert!(!response.success);
    assert_eq!(response.error_message(), "Model overloaded");
    assert!(response.data.is_none());
}

#[tokio::test]
async fn status_is_used_without_error_field() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(any())
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = client(&server, dir.path())
        .generate_financial_insights("u1")
        .await;
    assert_eq!(response.error_message(), "HTTP 404");
}

#[tokio::test]
async fn undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let response = client(&server, dir.path())
        .get_financial_advice(&UserContext::new("u1"))
        .await;
    assert!(response.error_message().starts_with("Invalid response"));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(insights_body())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(
        ApiClientConfig::new(server.uri())
            .timeout(Duration::from_millis(50))
            .cache_dir(dir.path()),
    )
    .unwrap();
    let response = client.generate_financial_insights("u1").await;
    assert_eq!(response.error_message(), "Request timeout");
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let client =
        ApiClient::new(ApiClientConfig::new("http://127.0.0.1:1").cache_dir(dir.path())).unwrap();
    let response = client.generate_financial_insights("u1").await;
    assert!(
        response.error_message().starts_with("Network error"),
        "{}",
        response.error_message()
    );
}

#[tokio::test]
async fn invalid_input_never_reaches_the_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = client(&server, dir.path());

    let response = client.generate_financial_insights("").await;
    assert!(response.error_message().contains("userId"));

    let response = client
        .get_financial_advice(&UserContext::new("u1").question("   "))
        .await;
    assert!(response.error_message().contains("question"));

    let response = client
        .analyze_financial_risk(&FinancialData::new("u1").total_debt(-5.0))
        .await;
    assert!(response.error_message().contains("totalDebt: must not be negative"));
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(path("/api/generate-insights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(insights_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        ApiClient::new(ApiClientConfig::new(format!("{}/", server.uri())).cache_dir(dir.path()))
            .unwrap();
    assert_eq!(client.base_url(), server.uri());
    assert!(client.generate_financial_insights("u1").await.is_success());
}

#[tokio::test]
async fn with_cache_serves_fresh_entries_without_calling() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, dir.path());
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let response = client
            .with_cache(
                "advice:u1",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ApiResponse::ok("Spend less".to_string())
                },
                Duration::from_secs(60),
            )
            .await;
        assert_eq!(response.data.as_deref(), Some("Spend less"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn with_cache_does_not_persist_failures() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, dir.path());

    let failed: ApiResponse<String> = client
        .with_cache(
            "k",
            || async { ApiResponse::failure("down") },
            Duration::from_secs(60),
        )
        .await;
    assert!(!failed.success);
    assert!(!client.cache().has("k"));
}

#[tokio::test]
async fn with_cache_survives_client_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    client(&server, dir.path())
        .with_cache(
            "k",
            || async { ApiResponse::ok(vec![1u32, 2, 3]) },
            Duration::from_secs(60),
        )
        .await;

    let restarted = client(&server, dir.path());
    let response = restarted
        .with_cache(
            "k",
            || async { ApiResponse::<Vec<u32>>::failure("should not run") },
            Duration::from_secs(60),
        )
        .await;
    assert_eq!(response.data, Some(vec![1, 2, 3]));
}

fn governed(server: &MockServer, cache_dir: &std::path::Path) -> smartspend::GovernedAdvisor {
    SmartSpend::builder()
        .api(ApiClientConfig::new(server.uri()).cache_dir(cache_dir))
        .queue(QueueConfig::new().min_delay(Duration::ZERO))
        .retry(
            RetryConfig::new()
                .max_attempts(3)
                .delay(Duration::from_millis(1)),
        )
        .sweep_interval(Duration::ZERO)
        .build()
        .unwrap()
}

#[tokio::test]
async fn governed_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/generate-insights"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad input"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = governed(&server, dir.path())
        .generate_financial_insights("u1")
        .await;

    assert!(!response.success);
    assert_eq!(response.error_message(), "bad input");
    assert_eq!(response.status, Some(400));
}

#[tokio::test]
async fn governed_server_errors_are_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/risk-analysis"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let response = governed(&server, dir.path())
        .analyze_financial_risk(&FinancialData::new("u1"))
        .await;

    assert!(!response.success);
    assert_eq!(
        response.error_message(),
        "Failed after 3 attempts: HTTP 503"
    );
}
