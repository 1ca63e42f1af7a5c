//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Shared by `list_transactions` and `count_transactions` so both see the
//! same WHERE clause.

use chrono::NaiveDate;

use crate::filters::DashboardFilters;
use crate::models::{Category, Transaction, TransactionType};

/// Builder for constructing transaction query filters
///
/// The lifetime `'query` is how long borrowed parameters (ids, search text)
/// must remain valid.
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter<'query> {
    pub account_id: Option<&'query str>,
    pub group_id: Option<&'query str>,
    pub category: Option<Category>,
    pub tx_type: Option<TransactionType>,
    /// Substring match on the description
    pub search: Option<&'query str>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Oldest first instead of newest first
    pub ascending: bool,
}

/// Result of building a filter - contains SQL components and parameters
pub(super) struct FilterResult {
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account, category and group constraints of dashboard filters
    pub fn from_dashboard(filters: &'query DashboardFilters) -> Self {
        Self {
            account_id: filters.account.as_deref(),
            group_id: filters.group.as_deref(),
            category: filters.category,
            ..Self::default()
        }
    }

    pub fn account_id(mut self, id: Option<&'query str>) -> Self {
        self.account_id = id;
        self
    }

    pub fn group_id(mut self, id: Option<&'query str>) -> Self {
        self.group_id = id;
        self
    }

    pub fn category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn tx_type(mut self, tx_type: Option<TransactionType>) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub fn search(mut self, query: Option<&'query str>) -> Self {
        self.search = query;
        self
    }

    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    pub fn ascending(mut self, value: bool) -> Self {
        self.ascending = value;
        self
    }

    /// Same constraints as the SQL, applied to an in-memory transaction
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.account_id.is_some_and(|id| tx.account_id != id) {
            return false;
        }
        if self.group_id.is_some() && tx.group_id.as_deref() != self.group_id {
            return false;
        }
        if self.category.is_some_and(|c| tx.category != c) {
            return false;
        }
        if self.tx_type.is_some_and(|t| tx.tx_type != t) {
            return false;
        }
        if let Some(q) = self.search.map(str::trim).filter(|q| !q.is_empty()) {
            if !tx.description.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some((from, to)) = self.date_range {
            if tx.date < from || tx.date > to {
                return false;
            }
        }
        true
    }

    /// Build the filter components
    pub(super) fn build(&self) -> FilterResult {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(aid) = self.account_id {
            conditions.push("t.account_id = ?");
            params.push(Box::new(aid.to_string()));
        }

        if let Some(gid) = self.group_id {
            conditions.push("t.group_id = ?");
            params.push(Box::new(gid.to_string()));
        }

        if let Some(category) = self.category {
            conditions.push("t.category = ?");
            params.push(Box::new(category.as_str()));
        }

        if let Some(tx_type) = self.tx_type {
            conditions.push("t.tx_type = ?");
            params.push(Box::new(tx_type.as_str()));
        }

        if let Some(q) = self.search {
            if !q.trim().is_empty() {
                conditions.push("t.description LIKE ? COLLATE NOCASE");
                params.push(Box::new(format!("%{}%", q.trim())));
            }
        }

        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("t.date >= ? AND t.date <= ?");
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order_clause = if self.ascending {
            "ORDER BY t.date ASC, t.position ASC"
        } else {
            "ORDER BY t.date DESC, t.position DESC"
        };

        FilterResult {
            where_clause,
            order_clause,
            params,
        }
    }
}
