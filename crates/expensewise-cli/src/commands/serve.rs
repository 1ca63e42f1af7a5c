//! Server command implementation

use anyhow::{Context, Result};
use expensewise_core::{config::AppConfig, db::Database};

pub async fn cmd_serve(
    db: Database,
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("🚀 Starting Expense-Wise web server...");
    println!(
        "   Listening: http://{}:{}",
        config.server.host, config.server.port
    );
    println!(
        "   Chat rate limit: {} requests per {}s",
        config.rate_limit.requests, config.rate_limit.window_secs
    );
    if config.server.allowed_origins.is_empty() {
        println!("   CORS: same-origin only");
    }

    expensewise_server::serve(db, config)
        .await
        .context("Server error")
}
