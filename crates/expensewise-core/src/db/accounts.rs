//! Account operations

use std::collections::{BTreeMap, HashMap};

use rusqlite::{params, Connection};

use super::Database;
use crate::error::Result;
use crate::models::Account;

/// Insert an account and its month-end balances
pub(super) fn insert_account(conn: &Connection, account: &Account, position: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, name, currency, country, balance, position) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            account.id,
            account.name,
            account.currency,
            account.country,
            account.balance,
            position as i64,
        ],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO account_monthly_balances (account_id, month, balance) VALUES (?, ?, ?)",
    )?;
    for (month, balance) in &account.monthly_balance {
        stmt.execute(params![account.id, month, balance])?;
    }
    Ok(())
}

impl Database {
    /// List all accounts in import order
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;

        let mut balances: HashMap<String, BTreeMap<String, f64>> = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT account_id, month, balance FROM account_monthly_balances")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?;
            for row in rows {
                let (account_id, month, balance) = row?;
                balances.entry(account_id).or_default().insert(month, balance);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT id, name, currency, country, balance FROM accounts ORDER BY position",
        )?;
        let accounts = stmt
            .query_map([], |row| {
                Ok(Account {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    currency: row.get(2)?,
                    country: row.get(3)?,
                    balance: row.get(4)?,
                    monthly_balance: BTreeMap::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts
            .into_iter()
            .map(|mut account| {
                if let Some(monthly) = balances.remove(&account.id) {
                    account.monthly_balance = monthly;
                }
                account
            })
            .collect())
    }

    /// Get an account by ID
    pub fn get_account(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.list_accounts()?.into_iter().find(|a| a.id == id))
    }
}
