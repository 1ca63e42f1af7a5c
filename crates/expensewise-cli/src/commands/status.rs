//! Status and dashboard commands

use std::path::Path;

use anyhow::Result;
use chrono::Local;
use expensewise_core::{
    currency::{format_amount, primary_currency},
    db::Database,
    filters::DashboardFilters,
    stats::DashboardStats,
    ExchangeRates,
};

use crate::cli::DashboardArgs;

pub fn cmd_status(db_path: &Path, db: &Database) -> Result<()> {
    println!();
    println!("📊 Expense-Wise Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    if let Ok(metadata) = std::fs::metadata(db_path) {
        let size_kb = metadata.len() as f64 / 1024.0;
        if size_kb < 1024.0 {
            println!("   Size: {:.1} KB", size_kb);
        } else {
            println!("   Size: {:.1} MB", size_kb / 1024.0);
        }
    }

    let dataset = db.load_dataset()?;
    if dataset.is_empty() {
        println!();
        println!("   No data imported yet.");
        println!("   Import an export: expensewise import --file export.json");
        println!();
        return Ok(());
    }

    if let Some(meta) = db.import_metadata()? {
        println!("   Imported: {}", meta.imported_at.format("%Y-%m-%d %H:%M UTC"));
        if let Some(version) = &meta.app_version {
            println!("   App version: {}", version);
        }
    }

    println!();
    println!("   Transactions: {}", dataset.transactions.len());
    println!("   Accounts:     {}", dataset.accounts.len());
    println!("   Budgets:      {}", dataset.budgets.len());
    println!("   Groups:       {}", dataset.groups.len());
    println!(
        "   Primary currency: {}",
        primary_currency(&dataset.transactions)
    );
    println!();
    Ok(())
}

/// Filters from command-line flags, parsed the same way as the web query
pub fn dashboard_filters(args: &DashboardArgs) -> Result<DashboardFilters> {
    let pairs = [
        ("range", &args.range),
        ("from", &args.from),
        ("to", &args.to),
        ("currency", &args.currency),
        ("account", &args.account),
        ("category", &args.category),
        ("group", &args.group),
    ];
    let filters = DashboardFilters::from_query_pairs(
        pairs
            .into_iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key, v))),
    )?;
    Ok(filters)
}

pub fn cmd_dashboard(
    db: &Database,
    args: &DashboardArgs,
    rates: &ExchangeRates,
) -> Result<DashboardStats> {
    let filters = dashboard_filters(args)?;
    let dataset = db.load_dataset()?;
    let stats = DashboardStats::for_dataset(&dataset, &filters, Some(rates), Local::now().date_naive());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(stats);
    }

    let cur = stats.currency.as_str();
    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│        💰 Expense-Wise Dashboard        │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  Period:       {} to {} ({})",
        stats.range.from,
        stats.range.to,
        filters.range.as_str()
    );
    println!("  Income:       {}", format_amount(stats.income, cur));
    println!("  Expenses:     {}", format_amount(stats.expenses, cur));
    println!("  Net:          {}", format_amount(stats.net, cur));
    println!("  Balance:      {}", format_amount(stats.balance, cur));
    println!("  Transactions: {}", stats.transaction_count);

    if stats.previous.transaction_count > 0 {
        println!(
            "  vs previous:  expenses {:+.1}%, income {:+.1}%",
            stats.changes.expenses, stats.changes.income
        );
    }

    if !stats.top_categories.is_empty() {
        println!();
        println!("  Top categories:");
        for share in &stats.top_categories {
            println!(
                "    {:<22} {:>14}  {:>5.1}%",
                share.label,
                format_amount(share.amount, cur),
                share.percentage
            );
        }
    }

    if let Some(budget) = &stats.budget {
        println!();
        println!(
            "  Budget ({} month{}): {} of {} ({:.0}%)",
            budget.months,
            if budget.months == 1 { "" } else { "s" },
            format_amount(budget.total_spent, cur),
            format_amount(budget.total_budgeted, cur),
            budget.percentage
        );
        for line in &budget.categories {
            println!(
                "    {:<22} {:>14} / {:<14} {:>5.0}%  {}",
                line.label,
                format_amount(line.spent, cur),
                format_amount(line.budgeted, cur),
                line.percentage,
                line.status.as_str()
            );
        }
    }

    println!();
    Ok(stats)
}
