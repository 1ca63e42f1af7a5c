//! Shared command utilities
//!
//! - `open_db` - Open (and migrate) the database
//! - `load_config` - Config file plus environment overrides
//! - `confirm` - Interactive yes/no prompt

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use expensewise_core::{config::AppConfig, db::Database, ExchangeRates};

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(config_path).context("Failed to load config")
}

/// Load the configured exchange rates and install them process-wide
pub fn load_rates(config: &AppConfig) -> Result<&'static ExchangeRates> {
    let rates = ExchangeRates::load(config.currency.rates_file.as_deref())
        .context("Failed to load exchange rates")?;
    if !ExchangeRates::install(rates) {
        tracing::debug!("Exchange rates already installed");
    }
    Ok(ExchangeRates::cached())
}

/// Ask a yes/no question on stdin; anything but `y` is no
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
