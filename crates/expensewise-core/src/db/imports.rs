//! Whole-dataset operations: import, clear, snapshot
//!
//! An import replaces everything stored. Both replace and clear run inside
//! one SQLite transaction, so a failure leaves the previous data untouched.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::accounts::insert_account;
use super::budgets::insert_budget;
use super::groups::insert_group;
use super::transactions::insert_transaction;
use super::{parse_datetime, Database};
use crate::error::Result;
use crate::import::ImportBundle;
use crate::models::{Dataset, ImportMetadata, ImportStats};

fn delete_all(conn: &Connection) -> Result<()> {
    // Children before parents
    conn.execute_batch(
        r#"
        DELETE FROM transactions;
        DELETE FROM account_monthly_balances;
        DELETE FROM accounts;
        DELETE FROM budget_categories;
        DELETE FROM budgets;
        DELETE FROM "groups";
        DELETE FROM import_metadata;
        "#,
    )?;
    Ok(())
}

impl Database {
    /// Replace all stored data with the contents of `bundle`
    pub fn replace_all(&self, bundle: &ImportBundle) -> Result<ImportStats> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        delete_all(&tx)?;

        for (i, group) in bundle.groups.iter().enumerate() {
            insert_group(&tx, group, i)?;
        }
        for (i, account) in bundle.accounts.iter().enumerate() {
            insert_account(&tx, account, i)?;
        }
        for (i, budget) in bundle.budgets.iter().enumerate() {
            insert_budget(&tx, budget, i)?;
        }
        for (i, transaction) in bundle.transactions.iter().enumerate() {
            insert_transaction(&tx, transaction, i)?;
        }

        let stats = bundle.stats();
        tx.execute(
            r#"
            INSERT INTO import_metadata (
                id, user_id, app_version, backed_up_at, imported_at, fingerprint,
                transaction_count, account_count, budget_count, group_count
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                bundle.user_id,
                bundle.app_version,
                bundle.backed_up_at,
                Utc::now().to_rfc3339(),
                bundle.fingerprint,
                stats.transactions as i64,
                stats.accounts as i64,
                stats.budgets as i64,
                stats.groups as i64,
            ],
        )?;

        tx.commit()?;

        info!(
            transactions = stats.transactions,
            accounts = stats.accounts,
            budgets = stats.budgets,
            groups = stats.groups,
            "Import stored"
        );
        Ok(stats)
    }

    /// Delete everything
    pub fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        delete_all(&tx)?;
        tx.commit()?;
        info!("All data cleared");
        Ok(())
    }

    /// Metadata of the last successful import, if any
    pub fn import_metadata(&self) -> Result<Option<ImportMetadata>> {
        let conn = self.conn()?;
        let metadata = conn
            .query_row(
                r#"
                SELECT user_id, app_version, backed_up_at, imported_at, fingerprint,
                       transaction_count, account_count, budget_count, group_count
                FROM import_metadata WHERE id = 1
                "#,
                [],
                |row| {
                    let imported_at: String = row.get(3)?;
                    Ok(ImportMetadata {
                        user_id: row.get(0)?,
                        app_version: row.get(1)?,
                        backed_up_at: row.get(2)?,
                        imported_at: parse_datetime(&imported_at),
                        fingerprint: row.get(4)?,
                        stats: ImportStats {
                            transactions: row.get::<_, i64>(5)? as usize,
                            accounts: row.get::<_, i64>(6)? as usize,
                            budgets: row.get::<_, i64>(7)? as usize,
                            groups: row.get::<_, i64>(8)? as usize,
                        },
                    })
                },
            )
            .optional()?;
        Ok(metadata)
    }

    /// Load everything into memory for analytics, search and tools
    pub fn load_dataset(&self) -> Result<Dataset> {
        Ok(Dataset {
            transactions: self.all_transactions()?,
            accounts: self.list_accounts()?,
            budgets: self.list_budgets()?,
            groups: self.list_groups()?,
        })
    }
}
