//! Chat tools over the imported data
//!
//! Each tool takes JSON parameters (schema generated with `schemars`) and
//! returns a plain-text block the model can read. Tools run against the
//! in-memory [`IndexedDataset`], never the database.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::ai::Tool;
use crate::budget::BudgetBreakdown;
use crate::currency::{convert_or_zero, format_amount, primary_currency, ExchangeRates};
use crate::error::{Error, Result};
use crate::filters::{
    month_key, months_ending, parse_date, preset_range, resolve_period, DateRange, RangePreset,
};
use crate::models::{Account, Category, Group, Transaction, TransactionType};
use crate::search::IndexedDataset;

/// Default number of search results
const DEFAULT_SEARCH_LIMIT: usize = 20;
/// Hard cap on search results
const MAX_SEARCH_LIMIT: usize = 100;
/// Longest monthly trend
const MAX_TREND_MONTHS: u32 = 36;

/// Names of all tools, in catalog order
pub const TOOL_NAMES: [&str; 6] = [
    "search_transactions",
    "spending_by_category",
    "monthly_trend",
    "account_summary",
    "budget_status",
    "group_expenses",
];

/// Everything a tool needs to answer a query
pub struct ToolContext<'a> {
    pub data: &'a IndexedDataset,
    pub rates: Option<&'a ExchangeRates>,
    pub today: NaiveDate,
}

impl<'a> ToolContext<'a> {
    pub fn new(data: &'a IndexedDataset, rates: Option<&'a ExchangeRates>, today: NaiveDate) -> Self {
        Self { data, rates, today }
    }

    /// Requested currency, or the primary currency of the data
    fn currency(&self, requested: Option<&str>) -> String {
        requested
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| primary_currency(&self.data.dataset.transactions))
    }

    fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        convert_or_zero(amount, from, to, self.rates)
    }

    /// Period, or explicit dates, or the given default preset
    fn range(
        &self,
        period: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        default: RangePreset,
    ) -> Result<DateRange> {
        let span = self.data.dataset.date_span();
        if let Some(period) = period.filter(|p| !p.trim().is_empty()) {
            return resolve_period(period, self.today, span);
        }
        let from = from.filter(|s| !s.trim().is_empty()).map(parse_date).transpose()?;
        let to = to.filter(|s| !s.trim().is_empty()).map(parse_date).transpose()?;
        if from.is_none() && to.is_none() {
            return Ok(preset_range(default, self.today, span));
        }
        let fallback = preset_range(RangePreset::All, self.today, span);
        Ok(DateRange::new(
            from.unwrap_or(fallback.from),
            to.unwrap_or(self.today),
        ))
    }

    fn account(&self, key: Option<&str>) -> Result<Option<&'a Account>> {
        match key.filter(|k| !k.trim().is_empty()) {
            None => Ok(None),
            Some(key) => self
                .data
                .dataset
                .resolve_account(key.trim())
                .map(Some)
                .ok_or_else(|| Error::InvalidData(format!("Unknown account: {}", key))),
        }
    }

    fn group(&self, key: Option<&str>) -> Result<Option<&'a Group>> {
        match key.filter(|k| !k.trim().is_empty()) {
            None => Ok(None),
            Some(key) => self
                .data
                .dataset
                .resolve_group(key.trim())
                .map(Some)
                .ok_or_else(|| Error::InvalidData(format!("Unknown group: {}", key))),
        }
    }

    fn account_name(&self, id: &str) -> &'a str {
        self.data
            .dataset
            .account(id)
            .map(|a| a.name.as_str())
            .unwrap_or("Unknown account")
    }
}

fn parse_category(value: Option<&str>) -> Result<Option<Category>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<Category>().map_err(Error::InvalidData))
        .transpose()
}

fn parse_type(value: Option<&str>) -> Result<Option<TransactionType>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.parse::<TransactionType>().map_err(Error::InvalidData))
        .transpose()
}

fn period_label(range: &DateRange) -> String {
    format!("{} to {}", range.from, range.to)
}

fn transaction_line(ctx: &ToolContext<'_>, tx: &Transaction) -> String {
    let mut line = format!(
        "{}  {:<8} {:>16}  {:<16} {}  [{}]",
        tx.date,
        tx.tx_type.as_str(),
        format_amount(tx.signed_amount(), &tx.currency),
        tx.category.label(),
        if tx.description.is_empty() { "(no description)" } else { tx.description.as_str() },
        ctx.account_name(&tx.account_id),
    );
    if let Some(group) = tx.group_id.as_deref().and_then(|g| ctx.data.dataset.group(g)) {
        let _ = write!(line, " ({})", group.name);
    }
    line
}

// =============================================================================
// search_transactions
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SearchTransactionsParams {
    #[schemars(description = "Words to search for in descriptions, categories, accounts and groups. Empty matches everything.")]
    pub query: Option<String>,

    #[serde(rename = "type")]
    #[schemars(description = "Transaction type: Expense, Income or Transfer")]
    pub tx_type: Option<String>,

    #[schemars(description = "Category key such as FOOD_DINING or a label such as 'Dining Out'")]
    pub category: Option<String>,

    #[schemars(description = "Account id or name")]
    pub account: Option<String>,

    #[schemars(description = "Group id or name")]
    pub group: Option<String>,

    #[schemars(description = "Time period: this-month, last-month, last-30-days, last-90-days, last-3-months, last-6-months, last-12-months, this-year, last-year, all, YYYY-MM or YYYY-MM-DD. Defaults to all.")]
    pub period: Option<String>,

    #[schemars(description = "Start date in YYYY-MM-DD format, used when period is not given")]
    pub from_date: Option<String>,

    #[schemars(description = "End date in YYYY-MM-DD format, used when period is not given")]
    pub to_date: Option<String>,

    #[schemars(description = "Minimum amount (positive number, original currency)")]
    pub min_amount: Option<f64>,

    #[schemars(description = "Maximum amount (positive number, original currency)")]
    pub max_amount: Option<f64>,

    #[schemars(description = "Maximum number of results (default 20, max 100)")]
    pub limit: Option<usize>,
}

pub fn search_transactions(ctx: &ToolContext<'_>, params: SearchTransactionsParams) -> Result<String> {
    let range = ctx.range(
        params.period.as_deref(),
        params.from_date.as_deref(),
        params.to_date.as_deref(),
        RangePreset::All,
    )?;
    let tx_type = parse_type(params.tx_type.as_deref())?;
    let category = parse_category(params.category.as_deref())?;
    let account = ctx.account(params.account.as_deref())?;
    let group = ctx.group(params.group.as_deref())?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let matches: Vec<&Transaction> = ctx
        .data
        .search(params.query.as_deref().unwrap_or(""))
        .into_iter()
        .filter(|t| range.contains(t.date))
        .filter(|t| tx_type.map_or(true, |ty| t.tx_type == ty))
        .filter(|t| category.map_or(true, |c| t.category == c))
        .filter(|t| account.map_or(true, |a| t.account_id == a.id))
        .filter(|t| group.map_or(true, |g| t.group_id.as_deref() == Some(g.id.as_str())))
        .filter(|t| params.min_amount.map_or(true, |min| t.amount >= min))
        .filter(|t| params.max_amount.map_or(true, |max| t.amount <= max))
        .collect();

    let currency = ctx.currency(None);
    let (mut expenses, mut income) = (0.0, 0.0);
    for tx in &matches {
        let amount = ctx.convert(tx.amount, &tx.currency, &currency);
        match tx.tx_type {
            TransactionType::Expense => expenses += amount,
            TransactionType::Income => income += amount,
            TransactionType::Transfer => {}
        }
    }

    if matches.is_empty() {
        return Ok(format!(
            "No transactions found for {}.",
            period_label(&range)
        ));
    }

    let mut out = format!(
        "Found {} transactions ({}), showing {}.\nTotal expenses: {}  Total income: {}\n\n",
        matches.len(),
        period_label(&range),
        matches.len().min(limit),
        format_amount(expenses, &currency),
        format_amount(income, &currency),
    );
    for tx in matches.iter().take(limit) {
        out.push_str(&transaction_line(ctx, tx));
        out.push('\n');
    }
    Ok(out)
}

// =============================================================================
// spending_by_category
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SpendingByCategoryParams {
    #[schemars(description = "Time period: this-month, last-month, last-30-days, last-90-days, last-3-months, last-6-months, last-12-months, this-year, last-year, all, YYYY-MM. Defaults to this-month.")]
    pub period: Option<String>,

    #[schemars(description = "Start date in YYYY-MM-DD format, used when period is not given")]
    pub from_date: Option<String>,

    #[schemars(description = "End date in YYYY-MM-DD format, used when period is not given")]
    pub to_date: Option<String>,

    #[serde(rename = "type")]
    #[schemars(description = "Expense (default) or Income")]
    pub tx_type: Option<String>,

    #[schemars(description = "Account id or name")]
    pub account: Option<String>,

    #[schemars(description = "Group id or name")]
    pub group: Option<String>,

    #[schemars(description = "Currency code for totals (defaults to the primary currency)")]
    pub currency: Option<String>,
}

pub fn spending_by_category(ctx: &ToolContext<'_>, params: SpendingByCategoryParams) -> Result<String> {
    let range = ctx.range(
        params.period.as_deref(),
        params.from_date.as_deref(),
        params.to_date.as_deref(),
        RangePreset::ThisMonth,
    )?;
    let tx_type = parse_type(params.tx_type.as_deref())?.unwrap_or(TransactionType::Expense);
    if tx_type == TransactionType::Transfer {
        return Err(Error::InvalidData(
            "type must be Expense or Income for spending_by_category".into(),
        ));
    }
    let account = ctx.account(params.account.as_deref())?;
    let group = ctx.group(params.group.as_deref())?;
    let currency = ctx.currency(params.currency.as_deref());

    let mut totals: HashMap<Category, (f64, usize)> = HashMap::new();
    for tx in &ctx.data.dataset.transactions {
        if tx.tx_type != tx_type || !range.contains(tx.date) {
            continue;
        }
        if account.is_some_and(|a| tx.account_id != a.id) {
            continue;
        }
        if group.is_some_and(|g| tx.group_id.as_deref() != Some(g.id.as_str())) {
            continue;
        }
        let entry = totals.entry(tx.category).or_insert((0.0, 0));
        entry.0 += ctx.convert(tx.amount, &tx.currency, &currency);
        entry.1 += 1;
    }

    let label = if tx_type == TransactionType::Income { "Income" } else { "Spending" };
    if totals.is_empty() {
        return Ok(format!("No {} found for {}.", label.to_lowercase(), period_label(&range)));
    }

    let total: f64 = totals.values().map(|(a, _)| a).sum();
    let mut rows: Vec<(Category, f64, usize)> =
        totals.into_iter().map(|(c, (a, n))| (c, a, n)).collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut out = format!(
        "{} by category, {} (total {}):\n\n",
        label,
        period_label(&range),
        format_amount(total, &currency)
    );
    for (category, amount, count) in rows {
        let _ = writeln!(
            out,
            "{:<18} {:>18}  {:>5.1}%  {} transactions",
            category.label(),
            format_amount(amount, &currency),
            crate::budget::percentage(amount, total),
            count
        );
    }
    Ok(out)
}

// =============================================================================
// monthly_trend
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct MonthlyTrendParams {
    #[schemars(description = "Number of months ending with the current month (default 6, max 36)")]
    pub months: Option<u32>,

    #[schemars(description = "Only include this category (key or label)")]
    pub category: Option<String>,

    #[schemars(description = "Account id or name")]
    pub account: Option<String>,

    #[schemars(description = "Currency code for totals (defaults to the primary currency)")]
    pub currency: Option<String>,
}

pub fn monthly_trend(ctx: &ToolContext<'_>, params: MonthlyTrendParams) -> Result<String> {
    let months = params.months.unwrap_or(6).clamp(1, MAX_TREND_MONTHS);
    let category = parse_category(params.category.as_deref())?;
    let account = ctx.account(params.account.as_deref())?;
    let currency = ctx.currency(params.currency.as_deref());

    let starts = months_ending(ctx.today, months);
    let mut buckets: HashMap<String, (f64, f64)> =
        starts.iter().map(|m| (month_key(*m), (0.0, 0.0))).collect();

    for tx in &ctx.data.dataset.transactions {
        if category.is_some_and(|c| tx.category != c) {
            continue;
        }
        if account.is_some_and(|a| tx.account_id != a.id) {
            continue;
        }
        let Some(bucket) = buckets.get_mut(&month_key(tx.date)) else {
            continue;
        };
        let amount = ctx.convert(tx.amount, &tx.currency, &currency);
        match tx.tx_type {
            TransactionType::Income => bucket.0 += amount,
            TransactionType::Expense => bucket.1 += amount,
            TransactionType::Transfer => {}
        }
    }

    let mut out = format!(
        "Monthly trend, last {} months{} ({}):\n\n{:<8} {:>18} {:>18} {:>18}\n",
        months,
        category.map(|c| format!(", {}", c.label())).unwrap_or_default(),
        currency,
        "Month",
        "Income",
        "Expenses",
        "Net"
    );
    let (mut total_income, mut total_expenses) = (0.0, 0.0);
    for start in &starts {
        let key = month_key(*start);
        let (income, expenses) = buckets.get(&key).copied().unwrap_or_default();
        total_income += income;
        total_expenses += expenses;
        let _ = writeln!(
            out,
            "{:<8} {:>18} {:>18} {:>18}",
            key,
            format_amount(income, &currency),
            format_amount(expenses, &currency),
            format_amount(income - expenses, &currency)
        );
    }
    let _ = write!(
        out,
        "\nAverage monthly expenses: {}",
        format_amount(total_expenses / months as f64, &currency)
    );
    let _ = write!(
        out,
        "\nAverage monthly income: {}",
        format_amount(total_income / months as f64, &currency)
    );
    Ok(out)
}

// =============================================================================
// account_summary
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct AccountSummaryParams {
    #[schemars(description = "Currency code for the combined balance (defaults to the primary currency)")]
    pub currency: Option<String>,
}

pub fn account_summary(ctx: &ToolContext<'_>, params: AccountSummaryParams) -> Result<String> {
    let dataset = &ctx.data.dataset;
    if dataset.accounts.is_empty() {
        return Ok("No accounts imported.".to_string());
    }
    let currency = ctx.currency(params.currency.as_deref());

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tx in &dataset.transactions {
        *counts.entry(tx.account_id.as_str()).or_insert(0) += 1;
    }

    let mut out = format!("{} accounts:\n\n", dataset.accounts.len());
    let mut total = 0.0;
    for account in &dataset.accounts {
        total += ctx.convert(account.balance, &account.currency, &currency);
        let _ = writeln!(
            out,
            "{:<24} {:>18}  {:<4} {:>6} transactions{}",
            account.name,
            format_amount(account.balance, &account.currency),
            account.country.as_deref().unwrap_or("-"),
            counts.get(account.id.as_str()).copied().unwrap_or(0),
            account
                .monthly_balance
                .iter()
                .next_back()
                .map(|(month, balance)| format!(
                    "  (end of {}: {})",
                    month,
                    format_amount(*balance, &account.currency)
                ))
                .unwrap_or_default()
        );
    }
    let _ = write!(out, "\nCombined balance: {}", format_amount(total, &currency));
    Ok(out)
}

// =============================================================================
// budget_status
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct BudgetStatusParams {
    #[schemars(description = "Time period: this-month, last-month, this-year, YYYY-MM, etc. Defaults to this-month.")]
    pub period: Option<String>,

    #[schemars(description = "Start date in YYYY-MM-DD format, used when period is not given")]
    pub from_date: Option<String>,

    #[schemars(description = "End date in YYYY-MM-DD format, used when period is not given")]
    pub to_date: Option<String>,

    #[schemars(description = "Currency code for amounts (defaults to the primary currency)")]
    pub currency: Option<String>,
}

pub fn budget_status(ctx: &ToolContext<'_>, params: BudgetStatusParams) -> Result<String> {
    let dataset = &ctx.data.dataset;
    let Some(budget) = dataset.primary_budget() else {
        return Ok("No budget imported.".to_string());
    };
    let range = ctx.range(
        params.period.as_deref(),
        params.from_date.as_deref(),
        params.to_date.as_deref(),
        RangePreset::ThisMonth,
    )?;
    let primary = primary_currency(&dataset.transactions);
    let currency = ctx.currency(params.currency.as_deref());

    let mut spent: HashMap<Category, f64> = HashMap::new();
    let mut total_expenses = 0.0;
    for tx in &dataset.transactions {
        if !tx.is_expense() || !range.contains(tx.date) {
            continue;
        }
        let amount = ctx.convert(tx.amount, &tx.currency, &currency);
        *spent.entry(tx.category).or_insert(0.0) += amount;
        total_expenses += amount;
    }

    let breakdown = BudgetBreakdown::compute(
        budget,
        &spent,
        total_expenses,
        range.months_touched(),
        |amount| ctx.convert(amount, &primary, &currency),
    );

    let mut out = format!(
        "Budget status, {} ({} month{}):\nSpent {} of {} ({:.1}%)\n\n",
        period_label(&range),
        breakdown.months,
        if breakdown.months == 1 { "" } else { "s" },
        format_amount(breakdown.total_spent, &currency),
        format_amount(breakdown.total_budgeted, &currency),
        breakdown.percentage
    );
    for line in &breakdown.categories {
        let _ = writeln!(
            out,
            "{:<18} {:>18} of {:>18}  {:>6.1}%  {:<7} remaining {}",
            line.label,
            format_amount(line.spent, &currency),
            format_amount(line.budgeted, &currency),
            line.percentage,
            line.status.as_str(),
            format_amount(line.remaining, &currency)
        );
    }
    Ok(out)
}

// =============================================================================
// group_expenses
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct GroupExpensesParams {
    #[schemars(description = "Group id or name. Omit to list every group.")]
    pub group: Option<String>,

    #[schemars(description = "Time period (defaults to all)")]
    pub period: Option<String>,

    #[schemars(description = "Currency code for totals (defaults to the primary currency)")]
    pub currency: Option<String>,
}

pub fn group_expenses(ctx: &ToolContext<'_>, params: GroupExpensesParams) -> Result<String> {
    let dataset = &ctx.data.dataset;
    if dataset.groups.is_empty() {
        return Ok("No groups imported.".to_string());
    }
    let range = ctx.range(params.period.as_deref(), None, None, RangePreset::All)?;
    let only = ctx.group(params.group.as_deref())?;
    let currency = ctx.currency(params.currency.as_deref());

    let mut out = format!("Group expenses, {}:\n", period_label(&range));
    for group in dataset
        .groups
        .iter()
        .filter(|g| only.map_or(true, |o| o.id == g.id))
    {
        let mut total = 0.0;
        let mut count = 0;
        let mut by_category: HashMap<Category, f64> = HashMap::new();
        let mut first: Option<NaiveDate> = None;
        let mut last: Option<NaiveDate> = None;

        for tx in dataset.transactions.iter().filter(|t| {
            t.is_expense() && range.contains(t.date) && t.group_id.as_deref() == Some(group.id.as_str())
        }) {
            let amount = ctx.convert(tx.amount, &tx.currency, &currency);
            total += amount;
            count += 1;
            *by_category.entry(tx.category).or_insert(0.0) += amount;
            first = Some(first.map_or(tx.date, |d| d.min(tx.date)));
            last = Some(last.map_or(tx.date, |d| d.max(tx.date)));
        }

        let _ = write!(
            out,
            "\n{} ({}): {} across {} expenses",
            group.name,
            group.group_type,
            format_amount(total, &currency),
            count
        );
        if let (Some(first), Some(last)) = (first, last) {
            let _ = write!(out, ", {} to {}", first, last);
        }
        out.push('\n');

        let mut categories: Vec<(Category, f64)> = by_category.into_iter().collect();
        categories.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (category, amount) in categories.into_iter().take(5) {
            let _ = writeln!(
                out,
                "  {:<18} {:>18}",
                category.label(),
                format_amount(amount, &currency)
            );
        }
    }
    Ok(out)
}

// =============================================================================
// Catalog and dispatch
// =============================================================================

/// Tool definitions offered to the chat model
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        Tool::new(
            "search_transactions",
            "Search transactions by text with optional type, category, account, group, date and amount filters. Returns matching transactions newest first.",
            schemars::schema_for!(SearchTransactionsParams).into(),
        ),
        Tool::new(
            "spending_by_category",
            "Total expenses (or income) per category for a period, with percentage share.",
            schemars::schema_for!(SpendingByCategoryParams).into(),
        ),
        Tool::new(
            "monthly_trend",
            "Income, expenses and net per month for the last N months.",
            schemars::schema_for!(MonthlyTrendParams).into(),
        ),
        Tool::new(
            "account_summary",
            "List accounts with balances, currencies and transaction counts.",
            schemars::schema_for!(AccountSummaryParams).into(),
        ),
        Tool::new(
            "budget_status",
            "Compare the budget with actual spending per category for a period.",
            schemars::schema_for!(BudgetStatusParams).into(),
        ),
        Tool::new(
            "group_expenses",
            "Spending per group (trips, households, couples) with top categories.",
            schemars::schema_for!(GroupExpensesParams).into(),
        ),
    ]
}

fn params<T: serde::de::DeserializeOwned>(input: &serde_json::Value) -> Result<T> {
    let input = if input.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        input.clone()
    };
    serde_json::from_value(input).map_err(|e| Error::InvalidData(format!("Invalid params: {}", e)))
}

/// Run a tool by name
pub fn execute_tool(ctx: &ToolContext<'_>, name: &str, input: &serde_json::Value) -> Result<String> {
    debug!(tool = name, "Executing tool");
    match name {
        "search_transactions" => search_transactions(ctx, params(input)?),
        "spending_by_category" => spending_by_category(ctx, params(input)?),
        "monthly_trend" => monthly_trend(ctx, params(input)?),
        "account_summary" => account_summary(ctx, params(input)?),
        "budget_status" => budget_status(ctx, params(input)?),
        "group_expenses" => group_expenses(ctx, params(input)?),
        _ => Err(Error::NotFound(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Budget, Dataset, GroupType};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(
        id: &str,
        tx_type: TransactionType,
        amount: f64,
        category: Category,
        description: &str,
        date: NaiveDate,
    ) -> Transaction {
        Transaction {
            id: id.into(),
            tx_type,
            amount,
            currency: "EUR".into(),
            category,
            account_id: "a1".into(),
            description: description.into(),
            date,
            group_id: None,
        }
    }

    fn data() -> IndexedDataset {
        let mut dinner = tx("t3", TransactionType::Expense, 60.0, Category::FoodDining, "Dinner in Porto", d(2024, 3, 12));
        dinner.group_id = Some("g1".into());
        IndexedDataset::new(Dataset {
            transactions: vec![
                tx("t1", TransactionType::Income, 3000.0, Category::Salary, "March salary", d(2024, 3, 1)),
                tx("t2", TransactionType::Expense, 120.0, Category::FoodGroceries, "Pingo Doce", d(2024, 3, 4)),
                dinner,
                tx("t4", TransactionType::Expense, 45.0, Category::FoodGroceries, "Lidl", d(2024, 2, 20)),
                tx("t5", TransactionType::Transfer, 500.0, Category::Other, "To savings", d(2024, 3, 5)),
            ],
            accounts: vec![Account {
                id: "a1".into(),
                name: "Main".into(),
                currency: "EUR".into(),
                country: Some("PT".into()),
                balance: 2500.0,
                monthly_balance: BTreeMap::from([("2024-03".to_string(), 2500.0)]),
            }],
            budgets: vec![Budget {
                id: "b1".into(),
                total_amount: 400.0,
                categories: BTreeMap::from([
                    (Category::FoodGroceries, 300.0),
                    (Category::FoodDining, 50.0),
                ]),
            }],
            groups: vec![Group {
                id: "g1".into(),
                name: "Porto weekend".into(),
                group_type: GroupType::Trip,
            }],
        })
    }

    fn run(name: &str, input: serde_json::Value) -> Result<String> {
        let data = data();
        let ctx = ToolContext::new(&data, None, d(2024, 3, 31));
        execute_tool(&ctx, name, &input)
    }

    #[test]
    fn test_tool_definitions_have_object_schemas() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, TOOL_NAMES);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        }
        let search = &tools[0].input_schema["properties"];
        assert!(search.get("query").is_some());
        assert!(search.get("type").is_some());
    }

    #[test]
    fn test_search_transactions() {
        let out = run("search_transactions", json!({"query": "pingo"})).unwrap();
        assert!(out.starts_with("Found 1 transactions"));
        assert!(out.contains("Pingo Doce"));
        assert!(out.contains("-120.00 EUR"));

        let out = run("search_transactions", json!({"category": "FOOD_GROCERIES"})).unwrap();
        assert!(out.starts_with("Found 2 transactions"));
        assert!(out.contains("Total expenses: 165.00 EUR"));

        let out = run("search_transactions", json!({"group": "porto weekend"})).unwrap();
        assert!(out.contains("Dinner in Porto"));
        assert!(out.contains("(Porto weekend)"));
    }

    #[test]
    fn test_search_with_amount_and_limit() {
        let out = run(
            "search_transactions",
            json!({"type": "expense", "min_amount": 50, "limit": 1}),
        )
        .unwrap();
        assert!(out.starts_with("Found 2 transactions"));
        assert!(out.contains("showing 1"));
    }

    #[test]
    fn test_search_no_results() {
        let out = run("search_transactions", json!({"query": "zeppelin"})).unwrap();
        assert!(out.starts_with("No transactions found"));
    }

    #[test]
    fn test_spending_by_category() {
        let out = run("spending_by_category", json!({"period": "2024-03"})).unwrap();
        assert!(out.contains("total 180.00 EUR"));
        let groceries = out.find("Groceries").unwrap();
        let dining = out.find("Dining Out").unwrap();
        assert!(groceries < dining);
        assert!(!out.contains("Other"));

        let out = run("spending_by_category", json!({"period": "2024-03", "type": "income"})).unwrap();
        assert!(out.contains("Salary"));
        assert!(out.starts_with("Income by category"));
    }

    #[test]
    fn test_monthly_trend() {
        let out = run("monthly_trend", json!({"months": 3})).unwrap();
        assert!(out.contains("2024-01"));
        assert!(out.contains("2024-02"));
        assert!(out.contains("2024-03"));
        assert!(!out.contains("2023-12"));
        assert!(out.contains("180.00 EUR"));

        // capped at 36
        let out = run("monthly_trend", json!({"months": 100})).unwrap();
        assert!(out.contains("last 36 months"));
    }

    #[test]
    fn test_account_summary() {
        let out = run("account_summary", json!({})).unwrap();
        assert!(out.contains("Main"));
        assert!(out.contains("2,500.00 EUR"));
        assert!(out.contains("5 transactions"));
        assert!(out.contains("Combined balance: 2,500.00 EUR"));
    }

    #[test]
    fn test_budget_status() {
        let out = run("budget_status", json!({"period": "2024-03"})).unwrap();
        assert!(out.contains("Spent 180.00 EUR of 400.00 EUR"));
        // dining: 60 of 50 is over budget and sorts first
        let dining = out.find("Dining Out").unwrap();
        let groceries = out.find("Groceries").unwrap();
        assert!(dining < groceries);
        assert!(out.contains("over"));
    }

    #[test]
    fn test_group_expenses() {
        let out = run("group_expenses", json!({})).unwrap();
        assert!(out.contains("Porto weekend (trip): 60.00 EUR across 1 expenses"));
        assert!(out.contains("Dining Out"));

        let err = run("group_expenses", json!({"group": "Mars"})).unwrap_err();
        assert!(err.to_string().contains("Unknown group"));
    }

    #[test]
    fn test_unknown_tool_and_bad_params() {
        assert!(matches!(run("delete_everything", json!({})), Err(Error::NotFound(_))));
        assert!(matches!(
            run("monthly_trend", json!({"months": "many"})),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            run("search_transactions", json!({"period": "someday"})),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_null_input_uses_defaults() {
        let out = run("account_summary", serde_json::Value::Null).unwrap();
        assert!(out.contains("1 accounts"));
    }
}
