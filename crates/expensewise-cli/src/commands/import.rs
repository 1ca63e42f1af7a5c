//! Import and clear commands

use std::path::Path;

use anyhow::{Context, Result};
use expensewise_core::{db::Database, import::parse_export, ImportStats};

use super::confirm;

pub fn cmd_import(db: &Database, file: &Path) -> Result<ImportStats> {
    println!("📥 Importing {}...", file.display());

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let bundle = parse_export(&bytes).context("Export rejected")?;

    for warning in &bundle.warnings {
        println!("   ⚠️  {}", warning);
    }

    let stats = db.replace_all(&bundle).context("Failed to store import")?;

    println!("✅ Import complete (previous data replaced)");
    println!("   Transactions: {}", stats.transactions);
    println!("   Accounts:     {}", stats.accounts);
    println!("   Budgets:      {}", stats.budgets);
    println!("   Groups:       {}", stats.groups);

    Ok(stats)
}

pub fn cmd_clear(db: &Database, yes: bool) -> Result<()> {
    if !yes && !confirm("⚠️  This will delete all imported data. Are you sure?")? {
        println!("Cancelled.");
        return Ok(());
    }

    db.clear_all().context("Failed to clear data")?;
    println!("✅ All data deleted.");
    Ok(())
}
