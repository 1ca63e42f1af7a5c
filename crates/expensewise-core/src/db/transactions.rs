//! Transaction operations

use rusqlite::{params, params_from_iter, Connection, Row};

use super::transaction_filter::TransactionFilter;
use super::{invalid_column, parse_date_column, Database};
use crate::error::Result;
use crate::models::{Category, Transaction, TransactionType};

const TRANSACTION_COLUMNS: &str =
    "t.id, t.tx_type, t.amount, t.currency, t.category, t.account_id, t.description, t.date, t.group_id";

pub(super) fn insert_transaction(conn: &Connection, tx: &Transaction, position: usize) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT INTO transactions (id, tx_type, amount, currency, category, account_id, description, date, group_id, position)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )?;
    stmt.execute(params![
        tx.id,
        tx.tx_type.as_str(),
        tx.amount,
        tx.currency,
        tx.category.as_str(),
        tx.account_id,
        tx.description,
        tx.date.to_string(),
        tx.group_id,
        position as i64,
    ])?;
    Ok(())
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let tx_type: String = row.get(1)?;
    let category: String = row.get(4)?;
    let date: String = row.get(7)?;

    Ok(Transaction {
        id: row.get(0)?,
        tx_type: tx_type
            .parse::<TransactionType>()
            .map_err(|e| invalid_column(1, e))?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        category: category.parse::<Category>().map_err(|e| invalid_column(4, e))?,
        account_id: row.get(5)?,
        description: row.get(6)?,
        date: parse_date_column(&date, 7)?,
        group_id: row.get(8)?,
    })
}

impl Database {
    /// List transactions matching `filter`, newest first unless the filter
    /// asks otherwise
    pub fn list_transactions(
        &self,
        filter: &TransactionFilter<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let built = filter.build();

        let sql = format!(
            "SELECT {} FROM transactions t {} {} LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS, built.where_clause, built.order_clause
        );

        let mut params = built.params;
        params.push(Box::new(limit));
        params.push(Box::new(offset));

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_from_iter(params.iter().map(|p| p.as_ref())), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count transactions matching `filter`
    pub fn count_transactions(&self, filter: &TransactionFilter<'_>) -> Result<i64> {
        let conn = self.conn()?;
        let built = filter.build();
        let sql = format!("SELECT COUNT(*) FROM transactions t {}", built.where_clause);
        let count = conn.query_row(
            &sql,
            params_from_iter(built.params.iter().map(|p| p.as_ref())),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every transaction in import order
    pub fn all_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions t ORDER BY t.position",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map([], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }
}
