//! Dashboard statistics aggregator
//!
//! One linear pass over the transactions buckets every row into the selected
//! range, the mirrored previous range and the month series, converting each
//! amount into the display currency as it goes.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::budget::{percentage, BudgetBreakdown};
use crate::currency::{convert_or_zero, primary_currency, ExchangeRates};
use crate::filters::{
    month_index, month_key, months_ending, DashboardFilters, DateRange, MAX_YEAR, MIN_YEAR,
};
use crate::models::{Account, Budget, Category, Dataset, Transaction, TransactionType};

/// Minimum number of buckets in the month series
pub const MIN_SERIES_MONTHS: u32 = 12;

/// Maximum number of buckets in the month series
pub const MAX_SERIES_MONTHS: u32 = ((MAX_YEAR - MIN_YEAR + 1) * 12) as u32;

/// Number of categories in the top-categories list
pub const TOP_CATEGORIES: usize = 8;

/// Income/expense totals for one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    pub transaction_count: usize,
}

impl PeriodTotals {
    fn add(&mut self, tx_type: TransactionType, amount: f64) {
        match tx_type {
            TransactionType::Income => self.income += amount,
            TransactionType::Expense => self.expenses += amount,
            TransactionType::Transfer => {}
        }
        self.transaction_count += 1;
    }

    fn finish(mut self) -> Self {
        self.net = self.income - self.expenses;
        self
    }
}

/// Percentage change from the previous window to the current one
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodChanges {
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    pub transaction_count: f64,
}

/// Change from `previous` to `current` in percent; 0 when `previous` is 0
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 || !previous.is_finite() {
        return 0.0;
    }
    (current - previous) / previous.abs() * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    /// `YYYY-MM`
    pub month: String,
    pub income: f64,
    pub expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub category: Category,
    pub label: String,
    pub amount: f64,
    pub count: usize,
    /// Share of total expenses in percent
    pub percentage: f64,
}

/// Everything the dashboard shows for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub currency: String,
    pub primary_currency: String,
    pub range: DateRange,
    pub previous_range: DateRange,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    pub balance: f64,
    pub transaction_count: usize,
    pub previous: PeriodTotals,
    pub changes: PeriodChanges,
    pub monthly: Vec<MonthlyPoint>,
    pub top_categories: Vec<CategoryShare>,
    pub budget: Option<BudgetBreakdown>,
}

impl DashboardStats {
    /// Compute dashboard statistics for a dataset
    pub fn for_dataset(
        dataset: &Dataset,
        filters: &DashboardFilters,
        rates: Option<&ExchangeRates>,
        today: NaiveDate,
    ) -> Self {
        compute_dashboard(
            &dataset.transactions,
            &dataset.accounts,
            dataset.primary_budget(),
            filters,
            rates,
            today,
        )
    }
}

/// Aggregate transactions into dashboard statistics.
///
/// Transfers are counted but never contribute to income or expenses. Without
/// `rates`, amounts in other currencies than the display currency count as 0.
pub fn compute_dashboard(
    transactions: &[Transaction],
    accounts: &[Account],
    budget: Option<&Budget>,
    filters: &DashboardFilters,
    rates: Option<&ExchangeRates>,
    today: NaiveDate,
) -> DashboardStats {
    let primary = primary_currency(transactions);
    let display_currency = filters
        .currency
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| primary.clone());

    let span = transactions
        .iter()
        .map(|t| t.date)
        .min()
        .zip(transactions.iter().map(|t| t.date).max());
    let range = filters.date_range(today, span);
    let previous_range = range.previous();

    let series_len = range
        .months_touched()
        .clamp(MIN_SERIES_MONTHS, MAX_SERIES_MONTHS);
    let series_months = months_ending(range.to, series_len);
    let series_first = series_months
        .first()
        .map(|d| month_index(*d))
        .unwrap_or_else(|| month_index(range.to));
    let mut series = vec![(0.0_f64, 0.0_f64); series_months.len()];

    let mut current = PeriodTotals::default();
    let mut previous = PeriodTotals::default();
    let mut by_category: HashMap<Category, (f64, usize)> = HashMap::new();

    for tx in transactions {
        if !filters.matches(tx) {
            continue;
        }
        let amount = convert_or_zero(tx.amount, &tx.currency, &display_currency, rates);

        if range.contains(tx.date) {
            current.add(tx.tx_type, amount);
            if tx.is_expense() {
                let entry = by_category.entry(tx.category).or_insert((0.0, 0));
                entry.0 += amount;
                entry.1 += 1;
            }
        } else if previous_range.contains(tx.date) {
            previous.add(tx.tx_type, amount);
        }

        let idx = month_index(tx.date);
        if idx >= series_first {
            if let Some(bucket) = series.get_mut((idx - series_first) as usize) {
                match tx.tx_type {
                    TransactionType::Income => bucket.0 += amount,
                    TransactionType::Expense => bucket.1 += amount,
                    TransactionType::Transfer => {}
                }
            }
        }
    }

    let current = current.finish();
    let previous = previous.finish();

    let balance = accounts
        .iter()
        .filter(|a| filters.account.as_deref().map_or(true, |id| a.id == id))
        .map(|a| convert_or_zero(a.balance, &a.currency, &display_currency, rates))
        .sum();

    let monthly = series_months
        .iter()
        .zip(series)
        .map(|(month, (income, expenses))| MonthlyPoint {
            month: month_key(*month),
            income,
            expenses,
        })
        .collect();

    let spent: HashMap<Category, f64> = by_category.iter().map(|(c, (a, _))| (*c, *a)).collect();

    let mut top_categories: Vec<CategoryShare> = by_category
        .into_iter()
        .map(|(category, (amount, count))| CategoryShare {
            category,
            label: category.label().to_string(),
            amount,
            count,
            percentage: percentage(amount, current.expenses),
        })
        .collect();
    top_categories.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    top_categories.truncate(TOP_CATEGORIES);

    let budget = budget.map(|budget| {
        BudgetBreakdown::compute(
            budget,
            &spent,
            current.expenses,
            range.months_touched(),
            |amount| convert_or_zero(amount, &primary, &display_currency, rates),
        )
    });

    debug!(
        currency = %display_currency,
        from = %range.from,
        to = %range.to,
        count = current.transaction_count,
        "Computed dashboard stats"
    );

    DashboardStats {
        currency: display_currency,
        primary_currency: primary,
        range,
        previous_range,
        income: current.income,
        expenses: current.expenses,
        net: current.net,
        balance,
        transaction_count: current.transaction_count,
        changes: PeriodChanges {
            income: percent_change(current.income, previous.income),
            expenses: percent_change(current.expenses, previous.expenses),
            net: percent_change(current.net, previous.net),
            transaction_count: percent_change(
                current.transaction_count as f64,
                previous.transaction_count as f64,
            ),
        },
        previous,
        monthly,
        top_categories,
        budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::RangePreset;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(
        id: &str,
        tx_type: TransactionType,
        amount: f64,
        currency: &str,
        category: Category,
        date: NaiveDate,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            tx_type,
            amount,
            currency: currency.to_string(),
            category,
            account_id: "acc-1".to_string(),
            description: format!("tx {}", id),
            date,
            group_id: None,
        }
    }

    fn rates() -> ExchangeRates {
        ExchangeRates::from_json(r#"{"base":"USD","rates":{"EUR":0.5,"GBP":0.25}}"#).unwrap()
    }

    fn march_filters() -> DashboardFilters {
        DashboardFilters {
            range: RangePreset::Custom,
            from: Some(d(2024, 3, 1)),
            to: Some(d(2024, 3, 31)),
            ..Default::default()
        }
    }

    #[test]
    fn test_totals_exclude_transfers() {
        let txs = vec![
            tx("1", TransactionType::Income, 1000.0, "EUR", Category::Salary, d(2024, 3, 1)),
            tx("2", TransactionType::Expense, 200.0, "EUR", Category::Housing, d(2024, 3, 5)),
            tx("3", TransactionType::Transfer, 500.0, "EUR", Category::Other, d(2024, 3, 6)),
        ];

        let stats = compute_dashboard(&txs, &[], None, &march_filters(), None, d(2024, 3, 31));

        assert_eq!(stats.currency, "EUR");
        assert_eq!(stats.income, 1000.0);
        assert_eq!(stats.expenses, 200.0);
        assert_eq!(stats.net, 800.0);
        assert_eq!(stats.transaction_count, 3);
    }

    #[test]
    fn test_without_rates_other_currencies_count_zero() {
        let txs = vec![
            tx("1", TransactionType::Expense, 10.0, "EUR", Category::Shopping, d(2024, 3, 2)),
            tx("2", TransactionType::Expense, 10.0, "EUR", Category::Shopping, d(2024, 3, 3)),
            tx("3", TransactionType::Expense, 99.0, "GBP", Category::Shopping, d(2024, 3, 4)),
        ];

        let stats = compute_dashboard(&txs, &[], None, &march_filters(), None, d(2024, 3, 31));
        assert_eq!(stats.expenses, 20.0);

        let stats =
            compute_dashboard(&txs, &[], None, &march_filters(), Some(&rates()), d(2024, 3, 31));
        // 99 GBP = 396 USD = 198 EUR
        assert!((stats.expenses - 218.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_display_currency() {
        let txs = vec![tx("1", TransactionType::Expense, 10.0, "EUR", Category::Travel, d(2024, 3, 2))];
        let filters = DashboardFilters {
            currency: Some("usd".into()),
            ..march_filters()
        };
        let stats = compute_dashboard(&txs, &[], None, &filters, Some(&rates()), d(2024, 3, 31));
        assert_eq!(stats.currency, "USD");
        assert_eq!(stats.primary_currency, "EUR");
        assert!((stats.expenses - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_previous_period_and_changes() {
        let txs = vec![
            tx("1", TransactionType::Expense, 100.0, "EUR", Category::FoodDining, d(2024, 2, 15)),
            tx("2", TransactionType::Expense, 150.0, "EUR", Category::FoodDining, d(2024, 3, 15)),
            tx("3", TransactionType::Income, 500.0, "EUR", Category::Salary, d(2024, 3, 1)),
        ];

        let stats = compute_dashboard(&txs, &[], None, &march_filters(), None, d(2024, 3, 31));

        assert_eq!(stats.previous_range, DateRange::new(d(2024, 1, 30), d(2024, 2, 29)));
        assert_eq!(stats.previous.expenses, 100.0);
        assert_eq!(stats.changes.expenses, 50.0);
        // previous income was zero
        assert_eq!(stats.changes.income, 0.0);
    }

    #[test]
    fn test_month_series_is_contiguous_and_zero_filled() {
        let txs = vec![
            tx("1", TransactionType::Expense, 10.0, "EUR", Category::Other, d(2024, 1, 10)),
            tx("2", TransactionType::Expense, 20.0, "EUR", Category::Other, d(2024, 3, 10)),
            tx("3", TransactionType::Income, 30.0, "EUR", Category::Salary, d(2024, 5, 10)),
        ];
        let filters = DashboardFilters {
            range: RangePreset::All,
            ..Default::default()
        };

        let stats = compute_dashboard(&txs, &[], None, &filters, None, d(2024, 5, 20));

        assert_eq!(stats.monthly.len(), 12);
        assert_eq!(stats.monthly.first().unwrap().month, "2023-06");
        assert_eq!(stats.monthly.last().unwrap().month, "2024-05");
        let feb = stats.monthly.iter().find(|p| p.month == "2024-02").unwrap();
        assert_eq!(feb.expenses, 0.0);
        let mar = stats.monthly.iter().find(|p| p.month == "2024-03").unwrap();
        assert_eq!(mar.expenses, 20.0);
        assert_eq!(stats.monthly.last().unwrap().income, 30.0);
    }

    #[test]
    fn test_month_series_extends_for_long_ranges() {
        let filters = DashboardFilters {
            range: RangePreset::Custom,
            from: Some(d(2022, 1, 1)),
            to: Some(d(2024, 3, 31)),
            ..Default::default()
        };
        let stats = compute_dashboard(&[], &[], None, &filters, None, d(2024, 3, 31));
        assert_eq!(stats.monthly.len(), 27);
        assert_eq!(stats.monthly[0].month, "2022-01");
        assert_eq!(stats.currency, "USD");
    }

    #[test]
    fn test_extreme_custom_range_is_bounded() {
        let filters = DashboardFilters {
            range: RangePreset::Custom,
            from: Some(NaiveDate::MIN),
            to: Some(d(2024, 3, 31)),
            ..Default::default()
        };
        let txs = vec![tx("1", TransactionType::Expense, 10.0, "USD", Category::FoodDining, d(2024, 3, 2))];

        let stats = compute_dashboard(&txs, &[], None, &filters, None, d(2024, 3, 31));

        assert_eq!(stats.expenses, 10.0);
        assert_eq!(stats.previous_range.from, NaiveDate::MIN);
        assert_eq!(stats.monthly.len(), MAX_SERIES_MONTHS as usize);
        assert_eq!(stats.monthly.last().unwrap().month, "2024-03");
    }

    #[test]
    fn test_top_categories_capped_with_share() {
        let categories = [
            Category::FoodGroceries,
            Category::FoodDining,
            Category::Transportation,
            Category::Housing,
            Category::Utilities,
            Category::Healthcare,
            Category::Entertainment,
            Category::Shopping,
            Category::Travel,
            Category::Education,
        ];
        let txs: Vec<Transaction> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| {
                tx(&i.to_string(), TransactionType::Expense, (i + 1) as f64 * 10.0, "EUR", *c, d(2024, 3, 10))
            })
            .collect();

        let stats = compute_dashboard(&txs, &[], None, &march_filters(), None, d(2024, 3, 31));

        assert_eq!(stats.top_categories.len(), TOP_CATEGORIES);
        assert_eq!(stats.top_categories[0].category, Category::Education);
        let total: f64 = (1..=10).map(|i| i as f64 * 10.0).sum();
        assert!((stats.top_categories[0].percentage - 100.0 / total * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_filters_and_balance() {
        let mut other = tx("2", TransactionType::Expense, 40.0, "EUR", Category::Travel, d(2024, 3, 2));
        other.account_id = "acc-2".into();
        other.group_id = Some("g1".into());
        let txs = vec![
            tx("1", TransactionType::Expense, 10.0, "EUR", Category::Travel, d(2024, 3, 2)),
            other,
        ];
        let accounts = vec![
            Account {
                id: "acc-1".into(),
                name: "Main".into(),
                currency: "EUR".into(),
                country: None,
                balance: 100.0,
                monthly_balance: BTreeMap::new(),
            },
            Account {
                id: "acc-2".into(),
                name: "Travel card".into(),
                currency: "GBP".into(),
                country: None,
                balance: 50.0,
                monthly_balance: BTreeMap::new(),
            },
        ];

        let stats = compute_dashboard(&txs, &accounts, None, &march_filters(), Some(&rates()), d(2024, 3, 31));
        // 50 GBP = 200 USD = 100 EUR
        assert!((stats.balance - 200.0).abs() < 1e-9);

        let filters = DashboardFilters {
            account: Some("acc-2".into()),
            ..march_filters()
        };
        let stats = compute_dashboard(&txs, &accounts, None, &filters, Some(&rates()), d(2024, 3, 31));
        assert_eq!(stats.expenses, 40.0);
        assert!((stats.balance - 100.0).abs() < 1e-9);

        let filters = DashboardFilters {
            group: Some("g1".into()),
            ..march_filters()
        };
        let stats = compute_dashboard(&txs, &accounts, None, &filters, None, d(2024, 3, 31));
        assert_eq!(stats.transaction_count, 1);
    }

    #[test]
    fn test_budget_breakdown_attached() {
        let txs = vec![
            tx("1", TransactionType::Expense, 300.0, "EUR", Category::FoodGroceries, d(2024, 3, 2)),
            tx("2", TransactionType::Expense, 50.0, "EUR", Category::FoodDining, d(2024, 3, 2)),
        ];
        let budget = Budget {
            id: "b1".into(),
            total_amount: 500.0,
            categories: BTreeMap::from([
                (Category::FoodGroceries, 400.0),
                (Category::FoodDining, 25.0),
            ]),
        };

        let stats = compute_dashboard(&txs, &[], Some(&budget), &march_filters(), None, d(2024, 3, 31));
        let breakdown = stats.budget.unwrap();

        assert_eq!(breakdown.categories[0].category, Category::FoodDining);
        assert_eq!(breakdown.categories[0].percentage, 200.0);
        assert_eq!(breakdown.total_budgeted, 500.0);
        assert_eq!(breakdown.total_spent, 350.0);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(150.0, 100.0), 50.0);
        assert_eq!(percent_change(50.0, 100.0), -50.0);
        assert_eq!(percent_change(10.0, 0.0), 0.0);
        assert_eq!(percent_change(-50.0, -100.0), 50.0);
    }
}
