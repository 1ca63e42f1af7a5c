//! Budget operations

use std::collections::{BTreeMap, HashMap};

use rusqlite::{params, Connection};

use super::{invalid_column, Database};
use crate::error::Result;
use crate::models::{Budget, Category};

pub(super) fn insert_budget(conn: &Connection, budget: &Budget, position: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO budgets (id, total_amount, position) VALUES (?, ?, ?)",
        params![budget.id, budget.total_amount, position as i64],
    )?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO budget_categories (budget_id, category, amount) VALUES (?, ?, ?)",
    )?;
    for (category, amount) in &budget.categories {
        stmt.execute(params![budget.id, category.as_str(), amount])?;
    }
    Ok(())
}

impl Database {
    /// List budgets in import order (the first one drives the dashboard)
    pub fn list_budgets(&self) -> Result<Vec<Budget>> {
        let conn = self.conn()?;

        let mut categories: HashMap<String, BTreeMap<Category, f64>> = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT budget_id, category, amount FROM budget_categories")?;
            let rows = stmt.query_map([], |row| {
                let category: String = row.get(1)?;
                let category = category
                    .parse::<Category>()
                    .map_err(|e| invalid_column(1, e))?;
                Ok((row.get::<_, String>(0)?, category, row.get::<_, f64>(2)?))
            })?;
            for row in rows {
                let (budget_id, category, amount) = row?;
                categories.entry(budget_id).or_default().insert(category, amount);
            }
        }

        let mut stmt = conn.prepare("SELECT id, total_amount FROM budgets ORDER BY position")?;
        let budgets = stmt
            .query_map([], |row| {
                Ok(Budget {
                    id: row.get(0)?,
                    total_amount: row.get(1)?,
                    categories: BTreeMap::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets
            .into_iter()
            .map(|mut budget| {
                if let Some(amounts) = categories.remove(&budget.id) {
                    budget.categories = amounts;
                }
                budget
            })
            .collect())
    }
}
