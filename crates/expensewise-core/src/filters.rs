//! Dashboard filters and date ranges
//!
//! `DashboardFilters` is the value behind the dashboard's query string. It
//! round-trips through [`DashboardFilters::to_query_pairs`] and
//! [`DashboardFilters::from_query_pairs`] so the server, the CLI and a client
//! URL all describe the same view.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Category, Transaction};

/// Named date-range presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangePreset {
    #[default]
    ThisMonth,
    LastMonth,
    Last30Days,
    Last90Days,
    Last3Months,
    Last6Months,
    Last12Months,
    ThisYear,
    LastYear,
    All,
    Custom,
}

impl RangePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThisMonth => "this-month",
            Self::LastMonth => "last-month",
            Self::Last30Days => "last-30-days",
            Self::Last90Days => "last-90-days",
            Self::Last3Months => "last-3-months",
            Self::Last6Months => "last-6-months",
            Self::Last12Months => "last-12-months",
            Self::ThisYear => "this-year",
            Self::LastYear => "last-year",
            Self::All => "all",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for RangePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "this-month" | "thismonth" | "month" => Ok(Self::ThisMonth),
            "last-month" | "lastmonth" => Ok(Self::LastMonth),
            "last-30-days" | "last30days" | "30d" => Ok(Self::Last30Days),
            "last-90-days" | "last90days" | "90d" => Ok(Self::Last90Days),
            "last-3-months" | "last3months" | "3m" => Ok(Self::Last3Months),
            "last-6-months" | "last6months" | "6m" => Ok(Self::Last6Months),
            "last-12-months" | "last12months" | "12m" => Ok(Self::Last12Months),
            "this-year" | "thisyear" | "ytd" | "year" => Ok(Self::ThisYear),
            "last-year" | "lastyear" => Ok(Self::LastYear),
            "all" | "all-time" => Ok(Self::All),
            "custom" => Ok(Self::Custom),
            other => Err(Error::InvalidData(format!(
                "Invalid range: {}. Use: this-month, last-month, last-30-days, last-90-days, \
                 last-3-months, last-6-months, last-12-months, this-year, last-year, all, custom",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RangePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// Length in days, both ends included
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Window of the same duration ending the day before this one starts
    pub fn previous(&self) -> DateRange {
        let to = self.from.pred_opt().unwrap_or(self.from);
        let from = to
            .checked_sub_days(Days::new((self.days() - 1).max(0) as u64))
            .unwrap_or(NaiveDate::MIN);
        DateRange { from, to }
    }

    /// Number of calendar months this range touches
    pub fn months_touched(&self) -> u32 {
        month_index(self.to).saturating_sub(month_index(self.from)) + 1
    }
}

/// Months since year 0, for month arithmetic
pub(crate) fn month_index(date: NaiveDate) -> u32 {
    (date.year().max(0) as u32) * 12 + date.month0()
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`
pub fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// `YYYY-MM` key for the month containing `date`
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// First days of `count` contiguous months ending with the month of `end`
pub fn months_ending(end: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let last = month_start(end);
    (0..count)
        .rev()
        .filter_map(|back| last.checked_sub_months(Months::new(back)))
        .collect()
}

/// Earliest year accepted in filters and imports
pub const MIN_YEAR: i32 = 1900;

/// Latest year accepted in filters and imports
pub const MAX_YEAR: i32 = 2200;

/// Whether `date` falls within [`MIN_YEAR`]..=[`MAX_YEAR`]
pub fn is_supported_date(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// Parse a date in `YYYY-MM-DD` form
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidData(format!("Invalid date: {} (expected YYYY-MM-DD)", s)))?;
    if !is_supported_date(date) {
        return Err(Error::InvalidData(format!(
            "Date out of range: {} (years {}-{})",
            s, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(date)
}

/// Resolve a named period relative to `today`.
///
/// Also accepts a single `YYYY-MM-DD` day or a `YYYY-MM` month, which is how
/// chat tools let the model name arbitrary periods. `span` is the dataset's
/// first/last transaction date, used by `all`.
pub fn resolve_period(
    period: &str,
    today: NaiveDate,
    span: Option<(NaiveDate, NaiveDate)>,
) -> Result<DateRange> {
    let trimmed = period.trim();
    if trimmed.is_empty() {
        return Ok(preset_range(RangePreset::ThisMonth, today, span));
    }
    if let Ok(preset) = trimmed.parse::<RangePreset>() {
        if preset != RangePreset::Custom {
            return Ok(preset_range(preset, today, span));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if is_supported_date(date) {
            return Ok(DateRange::new(date, date));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d") {
        if is_supported_date(date) {
            return Ok(DateRange::new(date, month_end(date)));
        }
    }
    Err(Error::InvalidData(format!(
        "Invalid period: {}. Use a range name (this-month, last-month, this-year, last-year, \
         last-30-days, last-90-days, last-12-months, all), YYYY-MM or YYYY-MM-DD",
        period
    )))
}

/// Date range for a preset. `span` is the dataset's first/last transaction
/// date, used by `All` (and as the fallback for `Custom`).
pub fn preset_range(
    preset: RangePreset,
    today: NaiveDate,
    span: Option<(NaiveDate, NaiveDate)>,
) -> DateRange {
    let months_back = |n: u32| {
        let from = today
            .checked_sub_months(Months::new(n))
            .and_then(|d| d.succ_opt())
            .unwrap_or(today);
        DateRange::new(from, today)
    };
    match preset {
        RangePreset::ThisMonth => DateRange::new(month_start(today), today),
        RangePreset::LastMonth => {
            let prev = month_start(today).pred_opt().unwrap_or(today);
            DateRange::new(month_start(prev), prev)
        }
        RangePreset::Last30Days => DateRange::new(today - chrono::Duration::days(29), today),
        RangePreset::Last90Days => DateRange::new(today - chrono::Duration::days(89), today),
        RangePreset::Last3Months => months_back(3),
        RangePreset::Last6Months => months_back(6),
        RangePreset::Last12Months => months_back(12),
        RangePreset::ThisYear => DateRange::new(
            NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
            today,
        ),
        RangePreset::LastYear => DateRange::new(
            NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).unwrap_or(today),
            NaiveDate::from_ymd_opt(today.year() - 1, 12, 31).unwrap_or(today),
        ),
        RangePreset::All | RangePreset::Custom => match span {
            Some((first, last)) => DateRange::new(first, last.max(today)),
            None => DateRange::new(month_start(today), today),
        },
    }
}

/// Dashboard view filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilters {
    pub range: RangePreset,
    /// Custom range start (only meaningful with `RangePreset::Custom`)
    pub from: Option<NaiveDate>,
    /// Custom range end (only meaningful with `RangePreset::Custom`)
    pub to: Option<NaiveDate>,
    /// Display currency; the primary currency when unset
    pub currency: Option<String>,
    pub account: Option<String>,
    pub category: Option<Category>,
    pub group: Option<String>,
}

impl DashboardFilters {
    /// Resolve the selected date range
    pub fn date_range(&self, today: NaiveDate, span: Option<(NaiveDate, NaiveDate)>) -> DateRange {
        match self.range {
            RangePreset::Custom => {
                let fallback = preset_range(RangePreset::All, today, span);
                DateRange::new(
                    self.from.unwrap_or(fallback.from),
                    self.to.unwrap_or(today),
                )
            }
            preset => preset_range(preset, today, span),
        }
    }

    /// Non-date predicate: account, category and group filters
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(account) = &self.account {
            if &tx.account_id != account {
                return false;
            }
        }
        if let Some(category) = self.category {
            if tx.category != category {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if tx.group_id.as_deref() != Some(group.as_str()) {
                return false;
            }
        }
        true
    }

    /// URL query parameters describing these filters. Unset filters are omitted.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("range".to_string(), self.range.as_str().to_string())];
        if self.range == RangePreset::Custom {
            if let Some(from) = self.from {
                pairs.push(("from".to_string(), from.to_string()));
            }
            if let Some(to) = self.to {
                pairs.push(("to".to_string(), to.to_string()));
            }
        }
        if let Some(currency) = &self.currency {
            pairs.push(("currency".to_string(), currency.clone()));
        }
        if let Some(account) = &self.account {
            pairs.push(("account".to_string(), account.clone()));
        }
        if let Some(category) = self.category {
            pairs.push(("category".to_string(), category.as_str().to_string()));
        }
        if let Some(group) = &self.group {
            pairs.push(("group".to_string(), group.clone()));
        }
        pairs
    }

    /// Parse URL query parameters. Empty values are treated as unset and
    /// unknown keys are ignored. Supplying `from`/`to` without a range
    /// implies `custom`.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = DashboardFilters::default();
        let mut explicit_range = false;

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "range" => {
                    filters.range = value.parse()?;
                    explicit_range = true;
                }
                "from" => filters.from = Some(parse_date(value)?),
                "to" => filters.to = Some(parse_date(value)?),
                "currency" => filters.currency = Some(value.to_uppercase()),
                "account" => filters.account = Some(value.to_string()),
                "category" => {
                    filters.category = Some(value.parse().map_err(Error::InvalidData)?)
                }
                "group" => filters.group = Some(value.to_string()),
                _ => {}
            }
        }

        if !explicit_range && (filters.from.is_some() || filters.to.is_some()) {
            filters.range = RangePreset::Custom;
        }
        Ok(filters)
    }
}
