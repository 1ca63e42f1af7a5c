//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use clap::Parser;
use expensewise_core::{db::Database, ExchangeRates, LlmClient, MockBackend};
use serde_json::json;
use tempfile::TempDir;

use crate::cli::{Cli, Commands, DashboardArgs};
use crate::commands::{self, truncate};

fn sample_export() -> String {
    json!({
        "userId": "u-7",
        "docs": [
            {"_id": "a1", "data_type": "account", "name": "Checking", "currency": "EUR", "balance": 820},
            {"_id": "t1", "data_type": "transaction", "type": "Income", "amount": 2000,
             "currency": "EUR", "accountId": "a1", "date": "2024-05-01", "category": "SALARY",
             "description": "Salary May"},
            {"_id": "t2", "data_type": "transaction", "type": "Expense", "amount": 42.5,
             "currency": "EUR", "accountId": "a1", "date": "2024-05-03", "category": "FOOD_DINING",
             "description": "Ramen bar"},
            {"_id": "t3", "data_type": "transaction", "type": "Expense", "amount": 12,
             "currency": "EUR", "accountId": "a1", "date": "2024-05-09", "category": "FOOD_DINING",
             "description": "Ramen takeaway"}
        ]
    })
    .to_string()
}

/// Temp directory holding an export file, plus a database with it imported
fn imported_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("export.json");
    std::fs::write(&file, sample_export()).unwrap();

    let db = commands::open_db(&dir.path().join("test.db")).unwrap();
    commands::cmd_import(&db, &file).unwrap();
    (dir, db)
}

fn all_time() -> DashboardArgs {
    DashboardArgs {
        range: Some("all".into()),
        ..Default::default()
    }
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_dashboard_args() {
    let cli = Cli::try_parse_from([
        "expensewise",
        "--db",
        "other.db",
        "dashboard",
        "--range",
        "last-3-months",
        "--currency",
        "usd",
        "--json",
    ])
    .unwrap();

    assert_eq!(cli.db.to_str(), Some("other.db"));
    match cli.command {
        Commands::Dashboard(args) => {
            assert_eq!(args.range.as_deref(), Some("last-3-months"));
            assert!(args.json);
            let filters = commands::dashboard_filters(&args).unwrap();
            assert_eq!(filters.currency.as_deref(), Some("USD"));
        }
        _ => panic!("expected dashboard command"),
    }
}

#[test]
fn test_parse_chat_args() {
    let cli = Cli::try_parse_from([
        "expensewise",
        "chat",
        "--provider",
        "anthropic",
        "how",
        "much",
        "on",
        "food?",
    ])
    .unwrap();

    match cli.command {
        Commands::Chat(args) => {
            assert_eq!(args.provider, "anthropic");
            assert_eq!(args.message.join(" "), "how much on food?");
        }
        _ => panic!("expected chat command"),
    }

    assert!(Cli::try_parse_from(["expensewise", "chat"]).is_err());
}

#[test]
fn test_dashboard_filters_reject_bad_range() {
    let args = DashboardArgs {
        range: Some("fortnight".into()),
        ..Default::default()
    };
    assert!(commands::dashboard_filters(&args).is_err());
}

#[test]
fn test_dashboard_filters_custom_dates() {
    let args = DashboardArgs {
        from: Some("2024-05-01".into()),
        to: Some("2024-05-31".into()),
        ..Default::default()
    };
    let filters = commands::dashboard_filters(&args).unwrap();
    assert_eq!(filters.range, expensewise_core::RangePreset::Custom);
}

// ========== Import / Clear Tests ==========

#[test]
fn test_cmd_import() {
    let (_dir, db) = imported_db();
    let dataset = db.load_dataset().unwrap();
    assert_eq!(dataset.transactions.len(), 3);
    assert_eq!(dataset.accounts.len(), 1);
}

#[test]
fn test_cmd_import_invalid_keeps_data() {
    let (dir, db) = imported_db();
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"docs": [{"_id": "x", "data_type": "spaceship"}]}"#).unwrap();

    assert!(commands::cmd_import(&db, &bad).is_err());
    assert_eq!(db.load_dataset().unwrap().transactions.len(), 3);
}

#[test]
fn test_cmd_import_missing_file() {
    let dir = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_import(&db, &dir.path().join("nope.json")).is_err());
}

#[test]
fn test_cmd_clear() {
    let (_dir, db) = imported_db();
    commands::cmd_clear(&db, true).unwrap();
    assert!(db.load_dataset().unwrap().is_empty());
}

#[test]
fn test_cmd_status() {
    let (dir, db) = imported_db();
    assert!(commands::cmd_status(&dir.path().join("test.db"), &db).is_ok());

    let empty = Database::in_memory().unwrap();
    assert!(commands::cmd_status(&dir.path().join("missing.db"), &empty).is_ok());
}

// ========== Dashboard / Search / Tool Tests ==========

#[test]
fn test_cmd_dashboard() {
    let (_dir, db) = imported_db();
    let rates = ExchangeRates::embedded().unwrap();

    let stats = commands::cmd_dashboard(&db, &all_time(), &rates).unwrap();
    assert_eq!(stats.currency, "EUR");
    assert_eq!(stats.income, 2000.0);
    assert_eq!(stats.expenses, 54.5);
    assert_eq!(stats.transaction_count, 3);
}

#[test]
fn test_cmd_dashboard_json() {
    let (_dir, db) = imported_db();
    let rates = ExchangeRates::embedded().unwrap();
    let args = DashboardArgs {
        json: true,
        category: Some("FOOD_DINING".into()),
        ..all_time()
    };

    let stats = commands::cmd_dashboard(&db, &args, &rates).unwrap();
    assert_eq!(stats.transaction_count, 2);
    assert_eq!(stats.income, 0.0);
}

#[test]
fn test_cmd_search() {
    let (_dir, db) = imported_db();
    assert_eq!(commands::cmd_search(&db, "ramen", 10).unwrap(), 2);
    assert_eq!(commands::cmd_search(&db, "ramen bar", 10).unwrap(), 1);
    assert_eq!(commands::cmd_search(&db, "sushi", 10).unwrap(), 0);
}

#[test]
fn test_cmd_tool() {
    let (_dir, db) = imported_db();
    let rates = ExchangeRates::embedded().unwrap();

    let output = commands::cmd_tool(&db, &rates, "account_summary", None).unwrap();
    assert!(output.contains("Checking"));

    let output = commands::cmd_tool(
        &db,
        &rates,
        "search_transactions",
        Some(r#"{"query": "ramen"}"#),
    )
    .unwrap();
    assert!(output.contains("Ramen bar"));

    assert!(commands::cmd_tool(&db, &rates, "no_such_tool", None).is_err());
    assert!(commands::cmd_tool(&db, &rates, "account_summary", Some("{not json")).is_err());
}

// ========== Chat Tests ==========

#[tokio::test]
async fn test_run_chat_with_tools() {
    let (_dir, db) = imported_db();
    let rates = ExchangeRates::embedded().unwrap();
    let config = expensewise_core::AppConfig::default();

    let backend = MockBackend::new()
        .call_tool("spending_by_category", json!({"period": "all"}))
        .reply("Dining out cost you 54.50 EUR.");
    let client = LlmClient::mock(backend.clone());

    let run = commands::run_chat(client, &db, &config, &rates, "What did dining cost?")
        .await
        .unwrap();

    assert_eq!(run.answer, "Dining out cost you 54.50 EUR.");
    assert_eq!(run.tool_calls.len(), 1);
    assert!(run.tool_calls[0].success);

    let requests = backend.requests();
    assert!(requests[0].system.contains("Transactions: 3"));
}

// ========== Utility Tests ==========

#[test]
fn test_load_rates() {
    let rates = commands::load_rates(&expensewise_core::AppConfig::default()).unwrap();
    assert!(rates.supports("EUR"));
    assert!(rates.supports("USD"));
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long description", 10), "a long ...");
    assert_eq!(truncate("Café crème brûlée", 8), "Café ...");
}
