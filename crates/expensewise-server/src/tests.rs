//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use expensewise_core::test_utils::{MockLlmServer, BAD_API_KEY};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

fn test_config(llm_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.ollama.host = llm_url.to_string();
    config.ollama.cloud_url = llm_url.to_string();
    config.providers.openai_url = llm_url.to_string();
    config.providers.anthropic_url = llm_url.to_string();
    config
}

fn setup_app_with_config(config: AppConfig) -> Router {
    let db = Database::in_memory().unwrap();
    let state = AppState::with_parts(
        db,
        config,
        ExchangeRates::embedded().unwrap(),
        PromptLibrary::embedded_only(),
    );
    create_router_with_state(Arc::new(state))
}

fn setup_test_app() -> Router {
    // Nothing listens here; tests that talk to a model start a mock server
    setup_app_with_config(test_config("http://127.0.0.1:9"))
}

fn sample_export() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "userId": "u-1",
        "appVersion": "3.2.0",
        "docs": [
            {"_id": "a1", "data_type": "account", "name": "Wallet", "currency": "EUR", "balance": 250},
            {"_id": "g1", "data_type": "group", "name": "Porto", "type": "trip"},
            {"_id": "b1", "data_type": "budget", "totalAmount": 400,
             "categories": {"FOOD_GROCERIES": 200}},
            {"_id": "t1", "data_type": "transaction", "type": "Income", "amount": 1000,
             "currency": "EUR", "accountId": "a1", "date": "2024-01-10", "category": "SALARY",
             "description": "Salary"},
            {"_id": "t2", "data_type": "transaction", "type": "Expense", "amount": 40,
             "currency": "EUR", "accountId": "a1", "date": "2024-01-12", "category": "FOOD_GROCERIES",
             "description": "Supermarket"},
            {"_id": "t3", "data_type": "transaction", "type": "Expense", "amount": "25,50",
             "currency": "EUR", "accountId": "a1", "date": "2024-02-03", "category": "FOOD_GROCERIES",
             "description": "Supermarket", "groupId": "g1"}
        ]
    }))
    .unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn import(app: &Router, bytes: Vec<u8>) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/import")
                .header("content-type", "application/json")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn imported_app() -> Router {
    let app = setup_test_app();
    let response = import(&app, sample_export()).await;
    assert_eq!(response.status(), StatusCode::OK);
    app
}

// ========== Import / Status API Tests ==========

#[tokio::test]
async fn test_status_without_data() {
    let app = setup_test_app();
    let response = get(&app, "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["hasData"], false);
    assert!(json["import"].is_null());
    assert_eq!(json["transactions"], 0);
}

#[tokio::test]
async fn test_import_and_status() {
    let app = setup_test_app();

    let response = import(&app, sample_export()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["transactions"], 3);
    assert_eq!(json["accounts"], 1);
    assert_eq!(json["budgets"], 1);
    assert_eq!(json["groups"], 1);
    assert!(json["warnings"].as_array().unwrap().is_empty());

    let json = get_body_json(get(&app, "/api/status").await).await;
    assert_eq!(json["hasData"], true);
    assert_eq!(json["transactions"], 3);
    assert_eq!(json["primaryCurrency"], "EUR");
    assert_eq!(json["import"]["userId"], "u-1");
}

#[tokio::test]
async fn test_import_invalid_export() {
    let app = imported_app().await;

    let broken = serde_json::to_vec(&json!({
        "docs": [{"data_type": "transaction", "amount": 5}]
    }))
    .unwrap();
    let response = import(&app, broken).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid export file"));

    // Previous data is untouched
    let json = get_body_json(get(&app, "/api/status").await).await;
    assert_eq!(json["transactions"], 3);
}

#[tokio::test]
async fn test_import_empty_body() {
    let app = setup_test_app();
    let response = import(&app, Vec::new()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_data() {
    let app = imported_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["success"], true);

    let json = get_body_json(get(&app, "/api/status").await).await;
    assert_eq!(json["hasData"], false);
    assert_eq!(json["transactions"], 0);
}

// ========== Dashboard API Tests ==========

#[tokio::test]
async fn test_dashboard_all_time() {
    let app = imported_app().await;

    let response = get(&app, "/api/dashboard?range=all").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["currency"], "EUR");
    assert_eq!(json["income"], 1000.0);
    assert_eq!(json["expenses"], 65.5);
    assert_eq!(json["transactionCount"], 3);
    assert!(json["monthly"].as_array().unwrap().len() >= 12);
}

#[tokio::test]
async fn test_dashboard_group_filter() {
    let app = imported_app().await;

    let json = get_body_json(get(&app, "/api/dashboard?range=all&group=g1").await).await;
    assert_eq!(json["transactionCount"], 1);
    assert_eq!(json["expenses"], 25.5);
    assert_eq!(json["income"], 0.0);
}

#[tokio::test]
async fn test_dashboard_invalid_range() {
    let app = setup_test_app();
    let response = get(&app, "/api/dashboard?range=fortnight").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid range"));
}

#[tokio::test]
async fn test_dashboard_out_of_range_date() {
    let app = imported_app().await;
    let response = get(&app, "/api/dashboard?from=-262000-01-01&to=2024-03-31").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("-262000-01-01"));
}

#[tokio::test]
async fn test_get_currencies() {
    let app = setup_test_app();
    let json = get_body_json(get(&app, "/api/currencies").await).await;

    let currencies = json["currencies"].as_array().unwrap();
    assert!(currencies.iter().any(|c| c == "EUR"));
    assert!(currencies.iter().any(|c| c == "USD"));
    assert!(json["rates"].is_object());
}

// ========== Transaction / Listing API Tests ==========

#[tokio::test]
async fn test_list_transactions() {
    let app = imported_app().await;

    let json = get_body_json(get(&app, "/api/transactions").await).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["limit"], 50);
    let ids: Vec<&str> = json["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t3", "t2", "t1"]);
}

#[tokio::test]
async fn test_list_transactions_pagination() {
    let app = imported_app().await;

    let json = get_body_json(get(&app, "/api/transactions?order=asc&limit=1&offset=1").await).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["offset"], 1);
    let transactions = json["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["id"], "t2");
}

#[tokio::test]
async fn test_search_transactions() {
    let app = imported_app().await;

    let json = get_body_json(get(&app, "/api/transactions?q=supermarket").await).await;
    assert_eq!(json["total"], 2);
    // Equal scores fall back to newest first
    assert_eq!(json["transactions"][0]["id"], "t3");

    let json = get_body_json(get(&app, "/api/transactions?q=supermarket&group=g1").await).await;
    assert_eq!(json["total"], 1);

    let json = get_body_json(get(&app, "/api/transactions?q=bakery").await).await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_list_transactions_rejects_bad_filters() {
    let app = setup_test_app();

    let response = get(&app, "/api/transactions?category=NOT_A_CATEGORY").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(&app, "/api/transactions?from=2024-01-01").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(&app, "/api/transactions?from=2024-02-01&to=2024-01-01").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_accounts_budgets_groups() {
    let app = imported_app().await;

    let accounts = get_body_json(get(&app, "/api/accounts").await).await;
    assert_eq!(accounts.as_array().unwrap().len(), 1);
    assert_eq!(accounts[0]["name"], "Wallet");

    let budgets = get_body_json(get(&app, "/api/budgets").await).await;
    assert_eq!(budgets.as_array().unwrap().len(), 1);

    let groups = get_body_json(get(&app, "/api/groups").await).await;
    assert_eq!(groups[0]["name"], "Porto");
}

// ========== Tool API Tests ==========

#[tokio::test]
async fn test_list_tools() {
    let app = setup_test_app();
    let json = get_body_json(get(&app, "/api/tools").await).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 6);
    assert!(names.contains(&"search_transactions"));
    assert!(names.contains(&"group_expenses"));
}

#[tokio::test]
async fn test_run_tool() {
    let app = imported_app().await;

    let response = post_json(&app, "/api/tools/account_summary", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["output"].as_str().unwrap().contains("Wallet"));

    let response = post_json(
        &app,
        "/api/tools/search_transactions",
        json!({"query": "supermarket"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_run_unknown_tool() {
    let app = setup_test_app();
    let response = post_json(&app, "/api/tools/drop_tables", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_tool_invalid_params() {
    let app = setup_test_app();
    let response = post_json(&app, "/api/tools/monthly_trend", json!({"months": "many"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Chat API Tests ==========

fn chat_body(provider: &str, api_key: Option<&str>, text: &str) -> serde_json::Value {
    json!({
        "provider": provider,
        "apiKey": api_key,
        "messages": [
            {"role": "user", "parts": [{"type": "text", "text": text}]}
        ]
    })
}

#[tokio::test]
async fn test_chat_streams_tool_calls() {
    let server = MockLlmServer::start().await;
    let app = setup_app_with_config(test_config(&server.url()));
    let response = import(&app, sample_export()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        &app,
        "/api/chat",
        chat_body("openai", Some("test-key"), "Please use account_summary"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = get_body_text(response).await;
    let start = body.find(r#""type":"start""#).unwrap();
    let call = body.find(r#""type":"tool-call""#).unwrap();
    let result = body.find(r#""type":"tool-result""#).unwrap();
    let text = body.find(r#""type":"text-delta""#).unwrap();
    let finish = body.find(r#""type":"finish""#).unwrap();
    assert!(start < call && call < result && result < text && text < finish);

    assert!(body.contains(r#""toolName":"account_summary""#));
    assert!(body.contains("Here is what I found: 1 accounts:"));
    assert!(body.contains("[DONE]"));
}

#[tokio::test]
async fn test_chat_streams_ui_spec() {
    let server = MockLlmServer::start().await;
    let app = setup_app_with_config(test_config(&server.url()));

    let response = post_json(&app, "/api/chat", chat_body("ollama", None, "draw a chart")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = get_body_text(response).await;
    assert!(body.contains(r#""type":"ui-spec""#));
    assert!(body.contains("Spending is steady."));
    // The fenced block is not repeated in the text
    assert!(!body.contains("```ui-spec"));
}

#[tokio::test]
async fn test_chat_provider_error_becomes_chunk() {
    let server = MockLlmServer::start().await;
    let app = setup_app_with_config(test_config(&server.url()));

    let response = post_json(
        &app,
        "/api/chat",
        chat_body("anthropic", Some(BAD_API_KEY), "hello"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = get_body_text(response).await;
    assert!(body.contains(r#""type":"error""#));
    assert!(body.contains(r#""retryable":true"#));
    assert!(body.contains(r#""type":"finish""#));
}

#[tokio::test]
async fn test_chat_setup_failures() {
    let app = setup_test_app();

    let response = post_json(&app, "/api/chat", chat_body("llamafarm", None, "hi")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Unknown provider"));

    let response = post_json(&app, "/api/chat", chat_body("openai", None, "hi")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("API key required"));

    let response = post_json(
        &app,
        "/api/chat",
        json!({"provider": "ollama", "messages": []}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_chat_rate_limited() {
    let mut config = test_config("http://127.0.0.1:9");
    config.rate_limit.requests = 2;
    let app = setup_app_with_config(config);

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("authorization", "Bearer client-a")
            .body(Body::from(json!({"messages": []}).to_string()))
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("retry-after")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    // Other endpoints are not limited
    let response = get(&app, "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ========== Models API Tests ==========

#[tokio::test]
async fn test_list_models() {
    let server = MockLlmServer::start().await;
    let app = setup_app_with_config(test_config(&server.url()));

    let response = post_json(&app, "/api/models", json!({"provider": "ollama"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["name"], "llama3.1:latest");

    let response = post_json(
        &app,
        "/api/models",
        json!({"provider": "ollama-cloud", "apiKey": "cloud-key"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_models_errors() {
    let server = MockLlmServer::start().await;
    let app = setup_app_with_config(test_config(&server.url()));

    // Ollama Cloud is the default and needs a key
    let response = post_json(&app, "/api/models", json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(get_body_json(response).await["error"].is_string());

    let response = post_json(
        &app,
        "/api/models",
        json!({"provider": "ollama-cloud", "apiKey": BAD_API_KEY}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = post_json(&app, "/api/models", json!({"provider": "openai", "apiKey": "k"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Middleware Tests ==========

#[tokio::test]
async fn test_security_headers() {
    let app = setup_test_app();
    let response = get(&app, "/api/status").await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = setup_test_app();
    let response = get(&app, "/api/insights").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_core_error_status_mapping() {
    use expensewise_core::Error;

    let validation = AppError::from_core(Error::Validation(vec!["missing _id".into()]));
    assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        AppError::from_core(Error::InvalidData("bad".into())).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::from_core(Error::NotFound("tool".into())).status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        AppError::from_core(Error::Provider("down".into())).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
