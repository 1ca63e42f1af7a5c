//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `accounts` - Accounts and their month-end balances
//! - `transactions` - Transaction listing and filtering
//! - `budgets` - Budgets with per-category amounts
//! - `groups` - Shared-expense groups
//! - `imports` - Whole-dataset replace/clear and import metadata

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod accounts;
mod budgets;
mod groups;
mod imports;
mod transaction_filter;
mod transactions;

pub use transaction_filter::TransactionFilter;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse an RFC 3339 timestamp stored by this module
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored `YYYY-MM-DD` date inside a row mapper
pub(crate) fn parse_date_column(s: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Map an unparseable enum column to a conversion error
pub(crate) fn invalid_column(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(Error::InvalidData(message)),
    )
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;
        info!(path = %path, "Database ready");

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "expensewise_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the import writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- `position` keeps the order of the export file

            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                currency TEXT NOT NULL,
                country TEXT,
                balance REAL NOT NULL DEFAULT 0,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS account_monthly_balances (
                account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                month TEXT NOT NULL,                       -- YYYY-MM
                balance REAL NOT NULL,
                PRIMARY KEY (account_id, month)
            );

            CREATE TABLE IF NOT EXISTS "groups" (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                group_type TEXT NOT NULL DEFAULT 'other',
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                tx_type TEXT NOT NULL,                     -- expense, income, transfer
                amount REAL NOT NULL,                      -- non-negative magnitude
                currency TEXT NOT NULL,
                category TEXT NOT NULL,
                account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                description TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,                        -- YYYY-MM-DD
                group_id TEXT REFERENCES "groups"(id) ON DELETE SET NULL,
                position INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category);
            CREATE INDEX IF NOT EXISTS idx_transactions_group ON transactions(group_id);

            CREATE TABLE IF NOT EXISTS budgets (
                id TEXT PRIMARY KEY,
                total_amount REAL NOT NULL DEFAULT 0,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS budget_categories (
                budget_id TEXT NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                PRIMARY KEY (budget_id, category)
            );

            -- Single row describing the last successful import
            CREATE TABLE IF NOT EXISTS import_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                user_id TEXT,
                app_version TEXT,
                backed_up_at TEXT,
                imported_at TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                transaction_count INTEGER NOT NULL,
                account_count INTEGER NOT NULL,
                budget_count INTEGER NOT NULL,
                group_count INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}
