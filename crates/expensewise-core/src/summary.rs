//! Compact description of the imported data for the chat system prompt

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::currency::primary_currency;
use crate::models::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    pub transaction_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub primary_currency: String,
    /// Currency code to number of transactions
    pub currencies: BTreeMap<String, usize>,
    pub accounts: Vec<String>,
    pub groups: Vec<String>,
    pub budget_count: usize,
}

impl DataSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut currencies = BTreeMap::new();
        for tx in &dataset.transactions {
            *currencies.entry(tx.currency.clone()).or_insert(0) += 1;
        }
        let span = dataset.date_span();

        Self {
            transaction_count: dataset.transactions.len(),
            first_date: span.map(|(first, _)| first),
            last_date: span.map(|(_, last)| last),
            primary_currency: primary_currency(&dataset.transactions),
            currencies,
            accounts: dataset
                .accounts
                .iter()
                .map(|a| format!("{} ({})", a.name, a.currency))
                .collect(),
            groups: dataset
                .groups
                .iter()
                .map(|g| format!("{} ({})", g.name, g.group_type))
                .collect(),
            budget_count: dataset.budgets.len(),
        }
    }

    /// Text block injected into the system prompt
    pub fn to_prompt_text(&self) -> String {
        if self.transaction_count == 0 && self.accounts.is_empty() {
            return "No data has been imported yet.".to_string();
        }

        let mut lines = vec![format!("Transactions: {}", self.transaction_count)];
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            lines.push(format!("Date range: {} to {}", first, last));
        }
        lines.push(format!("Primary currency: {}", self.primary_currency));
        if self.currencies.len() > 1 {
            let parts: Vec<String> = self
                .currencies
                .iter()
                .map(|(code, count)| format!("{} ({})", code, count))
                .collect();
            lines.push(format!("Currencies: {}", parts.join(", ")));
        }
        if !self.accounts.is_empty() {
            lines.push(format!("Accounts: {}", self.accounts.join(", ")));
        }
        if !self.groups.is_empty() {
            lines.push(format!("Groups: {}", self.groups.join(", ")));
        }
        lines.push(if self.budget_count > 0 {
            "Budget: yes (monthly amounts per category)".to_string()
        } else {
            "Budget: none".to_string()
        });
        lines.join("\n")
    }
}
