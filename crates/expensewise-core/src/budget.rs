//! Budget-versus-actual math

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Budget, Category};

/// Percentage of `budgeted` consumed by `actual`; 0 when nothing is budgeted
pub fn percentage(actual: f64, budgeted: f64) -> f64 {
    if budgeted <= 0.0 || !budgeted.is_finite() || !actual.is_finite() {
        return 0.0;
    }
    actual / budgeted * 100.0
}

/// Consumption state of a budget line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Over,
}

impl BudgetStatus {
    pub fn from_percentage(pct: f64) -> Self {
        if pct > 100.0 {
            Self::Over
        } else if pct >= 80.0 {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Over => "over",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLine {
    pub category: Category,
    pub label: String,
    pub budgeted: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percentage: f64,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetBreakdown {
    pub budget_id: String,
    /// Calendar months the monthly amounts were scaled by
    pub months: u32,
    /// Sorted by percentage consumed, descending
    pub categories: Vec<BudgetLine>,
    pub total_budgeted: f64,
    pub total_spent: f64,
    pub percentage: f64,
}

impl BudgetBreakdown {
    /// Compare a budget against actual spending.
    ///
    /// `spent` holds expenses per category already in the display currency.
    /// Budget amounts are monthly; they are multiplied by `months` and then
    /// passed through `to_display`. The overall figures compare the budget's
    /// total amount (the category sum when no total is set) against
    /// `total_expenses`.
    pub fn compute(
        budget: &Budget,
        spent: &HashMap<Category, f64>,
        total_expenses: f64,
        months: u32,
        to_display: impl Fn(f64) -> f64,
    ) -> Self {
        let scale = months.max(1) as f64;

        let mut categories: Vec<BudgetLine> = budget
            .categories
            .iter()
            .map(|(category, amount)| {
                let budgeted = to_display(amount * scale);
                let spent = spent.get(category).copied().unwrap_or(0.0);
                let pct = percentage(spent, budgeted);
                BudgetLine {
                    category: *category,
                    label: category.label().to_string(),
                    budgeted,
                    spent,
                    remaining: budgeted - spent,
                    percentage: pct,
                    status: BudgetStatus::from_percentage(pct),
                }
            })
            .collect();

        categories.sort_by(|a, b| {
            b.percentage
                .total_cmp(&a.percentage)
                .then_with(|| a.category.cmp(&b.category))
        });

        let total_budgeted = if budget.total_amount > 0.0 {
            to_display(budget.total_amount * scale)
        } else {
            categories.iter().map(|l| l.budgeted).sum()
        };
        let total_spent = total_expenses;

        Self {
            budget_id: budget.id.clone(),
            months: months.max(1),
            categories,
            total_budgeted,
            total_spent,
            percentage: percentage(total_spent, total_budgeted),
        }
    }

    pub fn over_budget(&self) -> impl Iterator<Item = &BudgetLine> {
        self.categories
            .iter()
            .filter(|l| l.status == BudgetStatus::Over)
    }
}
