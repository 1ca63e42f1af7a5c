//! Search and direct tool commands

use anyhow::{Context, Result};
use chrono::Local;
use expensewise_core::{
    currency::format_amount,
    db::Database,
    search::IndexedDataset,
    tools::{execute_tool, ToolContext},
    ExchangeRates,
};
use serde_json::Value;

use super::truncate;

pub fn cmd_search(db: &Database, query: &str, limit: usize) -> Result<usize> {
    let data = IndexedDataset::new(db.load_dataset()?);
    let hits = data.search(query);

    if hits.is_empty() {
        println!("No transactions match \"{}\".", query);
        return Ok(0);
    }

    println!();
    println!(
        "{:<12} {:<10} {:<40} {:>14}  {}",
        "Date", "Type", "Description", "Amount", "Category"
    );
    println!("{}", "─".repeat(96));
    for tx in hits.iter().take(limit) {
        println!(
            "{:<12} {:<10} {:<40} {:>14}  {}",
            tx.date,
            tx.tx_type.as_str(),
            truncate(&tx.description, 40),
            format_amount(tx.amount, &tx.currency),
            tx.category.label()
        );
    }
    println!();
    if hits.len() > limit {
        println!("Showing {} of {} matches.", limit, hits.len());
    } else {
        println!("{} matches.", hits.len());
    }

    Ok(hits.len())
}

pub fn cmd_tool(
    db: &Database,
    rates: &ExchangeRates,
    name: &str,
    input: Option<&str>,
) -> Result<String> {
    let input: Value = match input {
        Some(raw) => serde_json::from_str(raw).context("Tool input is not valid JSON")?,
        None => Value::Object(Default::default()),
    };

    let data = IndexedDataset::new(db.load_dataset()?);
    let ctx = ToolContext::new(&data, Some(rates), Local::now().date_naive());
    let output = execute_tool(&ctx, name, &input)?;

    println!("{}", output);
    Ok(output)
}
