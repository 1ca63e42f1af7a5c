//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Expense-Wise - Spending dashboard and chat for your mobile app exports
#[derive(Parser)]
#[command(name = "expensewise")]
#[command(about = "Self-hosted spending dashboard for Expense-Wise exports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "expensewise.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to the data directory, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a mobile app export, replacing all stored data
    Import {
        /// Export JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete all imported data
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show what is stored
    Status,

    /// Show dashboard statistics
    Dashboard(DashboardArgs),

    /// Full-text search over transactions
    Search {
        /// Search terms (all must match)
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Run a chat tool directly
    Tool {
        /// Tool name (search_transactions, spending_by_category, ...)
        name: String,

        /// Tool input as JSON
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Ask a question about your data
    Chat(ChatArgs),

    /// Start the web server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct DashboardArgs {
    /// Range preset: this-month, last-month, last-30-days, last-90-days,
    /// last-3-months, last-6-months, last-12-months, this-year, last-year, all
    #[arg(short, long)]
    pub range: Option<String>,

    /// Custom start date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Custom end date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Display currency (defaults to the most used one)
    #[arg(short, long)]
    pub currency: Option<String>,

    /// Only this account id
    #[arg(long)]
    pub account: Option<String>,

    /// Only this category (key or label)
    #[arg(long)]
    pub category: Option<String>,

    /// Only this group id
    #[arg(long)]
    pub group: Option<String>,

    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Provider: ollama, ollama-cloud, openai, anthropic
    #[arg(long, default_value = "ollama")]
    pub provider: String,

    /// Model (defaults per provider)
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key for hosted providers
    #[arg(long)]
    pub api_key: Option<String>,

    /// Local Ollama URL
    #[arg(long)]
    pub ollama_url: Option<String>,

    /// The question
    #[arg(required = true)]
    pub message: Vec<String>,
}
