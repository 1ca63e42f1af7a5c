//! Currency conversion through a static exchange-rate snapshot
//!
//! Rates are multipliers relative to `base` (1 base unit = `rate` units of the
//! currency). Converting between two non-base currencies goes through the base.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::Transaction;

/// Snapshot compiled into the binary
const EMBEDDED_RATES: &str = include_str!("../data/exchange_rates.json");

/// Currency used when there is nothing to infer one from
pub const DEFAULT_CURRENCY: &str = "USD";

static CACHED: OnceLock<ExchangeRates> = OnceLock::new();

/// Exchange-rate snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base: String,
    /// Date the snapshot was taken, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub rates: BTreeMap<String, f64>,
}

impl ExchangeRates {
    /// Parse a snapshot from JSON, normalizing currency codes to uppercase
    pub fn from_json(json: &str) -> Result<Self> {
        let mut parsed: ExchangeRates = serde_json::from_str(json)?;
        parsed.base = parsed.base.trim().to_uppercase();
        parsed.rates = parsed
            .rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .map(|(code, rate)| (code.trim().to_uppercase(), rate))
            .collect();
        if parsed.base.is_empty() {
            return Err(Error::InvalidData("exchange rates have no base".into()));
        }
        Ok(parsed)
    }

    /// The snapshot shipped with the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_RATES)
    }

    /// Load rates from `path`, or the embedded snapshot when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                let rates = Self::from_json(&contents)?;
                debug!(path = %path.display(), count = rates.rates.len(), "Loaded exchange rates");
                Ok(rates)
            }
            None => Self::embedded(),
        }
    }

    /// Install process-wide rates. Returns false if rates were already cached.
    pub fn install(rates: ExchangeRates) -> bool {
        CACHED.set(rates).is_ok()
    }

    /// Process-wide rates; the embedded snapshot unless [`install`](Self::install) ran first
    pub fn cached() -> &'static ExchangeRates {
        CACHED.get_or_init(|| match Self::embedded() {
            Ok(rates) => rates,
            Err(e) => {
                warn!(error = %e, "Embedded exchange rates are invalid, conversion disabled");
                ExchangeRates {
                    base: DEFAULT_CURRENCY.to_string(),
                    date: None,
                    rates: BTreeMap::new(),
                }
            }
        })
    }

    /// Rate for a currency; the base currency is implicitly 1
    pub fn rate(&self, code: &str) -> Option<f64> {
        let code = code.trim().to_uppercase();
        if code == self.base {
            return Some(1.0);
        }
        self.rates.get(&code).copied()
    }

    pub fn supports(&self, code: &str) -> bool {
        self.rate(code).is_some()
    }

    /// Supported currency codes, base included, sorted
    pub fn currencies(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.rates.keys().cloned().collect();
        if !codes.contains(&self.base) {
            codes.push(self.base.clone());
            codes.sort();
        }
        codes
    }
}

/// Convert `amount` from one currency to another.
///
/// Identity when the codes match (case-insensitive). When either currency is
/// missing from the snapshot the amount is returned unconverted.
pub fn convert(amount: f64, from: &str, to: &str, rates: &ExchangeRates) -> f64 {
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return amount;
    }
    match (rates.rate(from), rates.rate(to)) {
        (Some(from_rate), Some(to_rate)) => amount / from_rate * to_rate,
        _ => {
            warn!(from, to, "Missing exchange rate, amount left unconverted");
            amount
        }
    }
}

/// Conversion used by analytics: with rates, convert; without rates, keep
/// amounts already in `to` and count everything else as zero.
pub fn convert_or_zero(amount: f64, from: &str, to: &str, rates: Option<&ExchangeRates>) -> f64 {
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return amount;
    }
    match rates {
        Some(rates) => convert(amount, from, to, rates),
        None => 0.0,
    }
}

/// Most frequent currency in a transaction set. Ties break alphabetically;
/// an empty set yields [`DEFAULT_CURRENCY`].
pub fn primary_currency(transactions: &[Transaction]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tx in transactions {
        *counts.entry(tx.currency.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_code, a_count), (b_code, b_count)| {
            a_count.cmp(b_count).then_with(|| b_code.cmp(a_code))
        })
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Format an amount with its currency code, e.g. `1,234.50 EUR`
pub fn format_amount(amount: f64, currency: &str) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!(
        "{}{}.{:02} {}",
        if negative { "-" } else { "" },
        grouped,
        frac,
        currency
    )
}
