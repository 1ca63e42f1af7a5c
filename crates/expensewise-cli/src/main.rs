//! Expense-Wise CLI - Spending dashboard for mobile app exports
//!
//! Usage:
//!   expensewise import --file export.json   Replace stored data with an export
//!   expensewise dashboard --range all       Show dashboard statistics
//!   expensewise chat "How much on food?"    Ask a question about your data
//!   expensewise serve --port 3000           Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { file } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_import(&db, &file).map(|_| ())
        }
        Commands::Clear { yes } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_clear(&db, yes)
        }
        Commands::Status => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_status(&cli.db, &db)
        }
        Commands::Dashboard(args) => {
            let db = commands::open_db(&cli.db)?;
            let rates = commands::load_rates(&config)?;
            commands::cmd_dashboard(&db, &args, rates).map(|_| ())
        }
        Commands::Search { query, limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_search(&db, &query, limit).map(|_| ())
        }
        Commands::Tool { name, input } => {
            let db = commands::open_db(&cli.db)?;
            let rates = commands::load_rates(&config)?;
            commands::cmd_tool(&db, rates, &name, input.as_deref()).map(|_| ())
        }
        Commands::Chat(args) => {
            let db = commands::open_db(&cli.db)?;
            let rates = commands::load_rates(&config)?;
            commands::cmd_chat(&db, &config, rates, &args).await
        }
        Commands::Serve { port, host } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_serve(db, config, host, port).await
        }
    }
}
