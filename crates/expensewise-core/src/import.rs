//! Mobile app export parser and validator
//!
//! The export is a JSON object with a flat `docs` array; each doc carries an
//! `_id` and a `data_type`. Every problem found is collected so the user sees
//! the whole list at once, and any problem rejects the whole file.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::filters::is_supported_date;
use crate::models::{
    Account, Budget, Category, Group, GroupType, ImportStats, Transaction, TransactionType,
};

/// Parsed and validated export, ready to be written in one transaction
#[derive(Debug, Clone, Default)]
pub struct ImportBundle {
    pub user_id: Option<String>,
    pub app_version: Option<String>,
    pub backed_up_at: Option<String>,
    /// SHA-256 hex of the raw export bytes
    pub fingerprint: String,
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    pub budgets: Vec<Budget>,
    pub groups: Vec<Group>,
    /// Non-fatal issues (e.g. unknown categories mapped to OTHER)
    pub warnings: Vec<String>,
}

impl ImportBundle {
    pub fn stats(&self) -> ImportStats {
        ImportStats {
            transactions: self.transactions.len(),
            accounts: self.accounts.len(),
            budgets: self.budgets.len(),
            groups: self.groups.len(),
        }
    }
}

/// SHA-256 fingerprint of an export file
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Parse a locale-ambiguous amount string, keeping its sign.
///
/// Currency symbols and spaces are ignored. When both `,` and `.` appear the
/// last one is the decimal separator. A single `,` followed by one or two
/// digits is a decimal separator, otherwise a thousands separator. Several
/// `.` are thousands separators. Parentheses or a leading/trailing `-`
/// make the value negative.
pub fn parse_amount(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-')
        || trimmed.ends_with('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Parse a JSON amount that may be a number or a string
fn amount_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Parse a date given as `YYYY-MM-DD`, an RFC 3339 timestamp, a naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp, or epoch milliseconds. Dates outside the
/// supported years are rejected.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    date_from_value(value).filter(|d| is_supported_date(*d))
}

fn date_from_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(date);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.date_naive());
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(dt.date());
                }
            }
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                return s
                    .parse::<i64>()
                    .ok()
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|dt| dt.date_naive());
            }
            None
        }
        _ => None,
    }
}

/// Look up the first present, non-null field among several spellings
fn field<'a>(doc: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| doc.get(*name))
        .find(|v| !v.is_null())
}

fn string_field(doc: &Map<String, Value>, names: &[&str]) -> Option<String> {
    field(doc, names).and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn currency_field(doc: &Map<String, Value>) -> std::result::Result<String, String> {
    let raw = string_field(doc, &["currency", "currencyCode", "currency_code"])
        .ok_or_else(|| "missing currency".to_string())?;
    let code = raw.to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(format!("invalid currency '{}'", raw))
    }
}

/// Validation state shared while walking the docs
struct Collector {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Collector {
    fn error(&mut self, index: usize, id: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        match id {
            Some(id) => self.errors.push(format!("doc #{} ({}): {}", index, id, message)),
            None => self.errors.push(format!("doc #{}: {}", index, message)),
        }
    }

    fn warn(&mut self, index: usize, id: &str, message: impl Into<String>) {
        let message = format!("doc #{} ({}): {}", index, id, message.into());
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Transaction fields before account/group references are checked
struct PendingTransaction {
    index: usize,
    tx: Transaction,
}

/// Parse and validate an export file.
///
/// Returns [`Error::Validation`] listing every problem when the file is not
/// acceptable; nothing partial is ever returned.
pub fn parse_export(bytes: &[u8]) -> Result<ImportBundle> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Validation(vec![format!("not valid JSON: {}", e)]))?;
    let root = root
        .as_object()
        .ok_or_else(|| Error::Validation(vec!["top level must be an object".into()]))?;
    let docs = root
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Validation(vec!["missing 'docs' array".into()]))?;

    let mut bundle = ImportBundle {
        user_id: string_field(root, &["userId", "user_id"]),
        app_version: string_field(root, &["appVersion", "app_version"]),
        backed_up_at: string_field(root, &["backedUpAt", "backed_up_at"]),
        fingerprint: fingerprint(bytes),
        ..Default::default()
    };

    let mut collector = Collector {
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut pending: Vec<PendingTransaction> = Vec::new();

    for (index, doc) in docs.iter().enumerate() {
        let Some(doc) = doc.as_object() else {
            collector.error(index, None, "doc must be an object");
            continue;
        };

        let id = match doc.get("_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                collector.error(index, None, "missing _id");
                continue;
            }
        };

        let data_type = string_field(doc, &["data_type", "dataType"])
            .unwrap_or_default()
            .to_lowercase();

        if !matches!(data_type.as_str(), "transaction" | "account" | "budget" | "group") {
            if data_type.is_empty() {
                collector.error(index, Some(&id), "missing data_type");
            } else {
                collector.error(index, Some(&id), format!("unknown data_type '{}'", data_type));
            }
            continue;
        }

        if !seen.insert((data_type.clone(), id.clone())) {
            collector.error(index, Some(&id), format!("duplicate {} _id", data_type));
            continue;
        }

        match data_type.as_str() {
            "transaction" => match parse_transaction(index, &id, doc, &mut collector) {
                Some(tx) => pending.push(PendingTransaction { index, tx }),
                None => continue,
            },
            "account" => {
                if let Some(account) = parse_account(index, &id, doc, &mut collector) {
                    bundle.accounts.push(account);
                }
            }
            "budget" => {
                if let Some(budget) = parse_budget(index, &id, doc, &mut collector) {
                    bundle.budgets.push(budget);
                }
            }
            _ => bundle.groups.push(parse_group(&id, doc, &mut collector, index)),
        }
    }

    let account_ids: HashSet<&str> = bundle.accounts.iter().map(|a| a.id.as_str()).collect();
    let group_ids: HashSet<&str> = bundle.groups.iter().map(|g| g.id.as_str()).collect();

    let mut transactions = Vec::with_capacity(pending.len());
    for PendingTransaction { index, mut tx } in pending {
        if !account_ids.contains(tx.account_id.as_str()) {
            collector.error(
                index,
                Some(&tx.id),
                format!("references unknown account '{}'", tx.account_id),
            );
            continue;
        }
        if let Some(group) = tx.group_id.as_deref() {
            if !group_ids.contains(group) {
                let message = format!("unknown group '{}' dropped", group);
                collector.warn(index, &tx.id, message);
                tx.group_id = None;
            }
        }
        transactions.push(tx);
    }
    bundle.transactions = transactions;

    if !collector.errors.is_empty() {
        debug!(errors = collector.errors.len(), "Export rejected");
        return Err(Error::Validation(collector.errors));
    }

    bundle.warnings = collector.warnings;
    debug!(
        transactions = bundle.transactions.len(),
        accounts = bundle.accounts.len(),
        budgets = bundle.budgets.len(),
        groups = bundle.groups.len(),
        warnings = bundle.warnings.len(),
        "Parsed export"
    );
    Ok(bundle)
}

fn parse_transaction(
    index: usize,
    id: &str,
    doc: &Map<String, Value>,
    collector: &mut Collector,
) -> Option<Transaction> {
    let errors_before = collector.errors.len();

    let tx_type = match string_field(doc, &["type", "transactionType", "transaction_type"]) {
        Some(raw) => match raw.parse::<TransactionType>() {
            Ok(t) => Some(t),
            Err(_) => {
                collector.error(index, Some(id), format!("invalid type '{}'", raw));
                None
            }
        },
        None => {
            collector.error(index, Some(id), "missing type");
            None
        }
    };

    let amount = match field(doc, &["amount"]) {
        Some(value) => match amount_value(value) {
            Some(a) => Some(a.abs()),
            None => {
                collector.error(index, Some(id), format!("invalid amount {}", value));
                None
            }
        },
        None => {
            collector.error(index, Some(id), "missing amount");
            None
        }
    };

    let currency = match currency_field(doc) {
        Ok(c) => Some(c),
        Err(e) => {
            collector.error(index, Some(id), e);
            None
        }
    };

    let account_id = string_field(doc, &["accountId", "account_id", "account"]);
    if account_id.is_none() {
        collector.error(index, Some(id), "missing account");
    }

    let date = match field(doc, &["date", "transactionDate", "transaction_date"]) {
        Some(value) => match parse_date_value(value) {
            Some(d) => Some(d),
            None => {
                collector.error(index, Some(id), format!("invalid date {}", value));
                None
            }
        },
        None => {
            collector.error(index, Some(id), "missing date");
            None
        }
    };

    let category = match string_field(doc, &["categoryId", "category_id", "category"]) {
        Some(raw) => raw.parse::<Category>().unwrap_or_else(|_| {
            collector.warn(index, id, format!("unknown category '{}' mapped to OTHER", raw));
            Category::Other
        }),
        None => Category::Other,
    };

    if collector.errors.len() > errors_before {
        return None;
    }

    Some(Transaction {
        id: id.to_string(),
        tx_type: tx_type?,
        amount: amount?,
        currency: currency?,
        category,
        account_id: account_id?,
        description: string_field(doc, &["description", "note", "title"]).unwrap_or_default(),
        date: date?,
        group_id: string_field(doc, &["groupId", "group_id", "group"]),
    })
}

fn parse_account(
    index: usize,
    id: &str,
    doc: &Map<String, Value>,
    collector: &mut Collector,
) -> Option<Account> {
    let errors_before = collector.errors.len();

    let name = string_field(doc, &["name"]);
    if name.is_none() {
        collector.error(index, Some(id), "missing name");
    }
    let currency = currency_field(doc)
        .map_err(|e| collector.error(index, Some(id), e))
        .ok();

    let balance = match field(doc, &["balance", "currentBalance", "current_balance"]) {
        Some(value) => amount_value(value).unwrap_or_else(|| {
            collector.error(index, Some(id), format!("invalid balance {}", value));
            0.0
        }),
        None => 0.0,
    };

    let mut monthly_balance = BTreeMap::new();
    match field(doc, &["monthlyBalance", "monthly_balance"]) {
        Some(Value::Object(months)) => {
            for (month, value) in months {
                let valid_key = NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
                    .is_ok()
                    && month.len() == 7;
                match (valid_key, amount_value(value)) {
                    (true, Some(amount)) => {
                        monthly_balance.insert(month.clone(), amount);
                    }
                    (false, _) => collector.error(
                        index,
                        Some(id),
                        format!("invalid monthlyBalance month '{}'", month),
                    ),
                    (true, None) => collector.error(
                        index,
                        Some(id),
                        format!("invalid monthlyBalance amount for {}", month),
                    ),
                }
            }
        }
        Some(other) => collector.error(
            index,
            Some(id),
            format!("monthlyBalance must be an object, got {}", other),
        ),
        None => {}
    }

    if collector.errors.len() > errors_before {
        return None;
    }

    Some(Account {
        id: id.to_string(),
        name: name?,
        currency: currency?,
        country: string_field(doc, &["country", "countryCode", "country_code"]),
        balance,
        monthly_balance,
    })
}

fn parse_budget(
    index: usize,
    id: &str,
    doc: &Map<String, Value>,
    collector: &mut Collector,
) -> Option<Budget> {
    let errors_before = collector.errors.len();

    let total_amount = match field(doc, &["totalAmount", "total_amount", "amount"]) {
        Some(value) => amount_value(value).map(f64::abs).unwrap_or_else(|| {
            collector.error(index, Some(id), format!("invalid totalAmount {}", value));
            0.0
        }),
        None => {
            collector.error(index, Some(id), "missing totalAmount");
            0.0
        }
    };

    let mut categories = BTreeMap::new();
    match field(doc, &["categories", "categoryBudgets", "category_budgets"]) {
        Some(Value::Object(entries)) => {
            for (key, value) in entries {
                let category = key.parse::<Category>().map_err(|_| {
                    collector.error(index, Some(id), format!("unknown budget category '{}'", key))
                });
                let amount = amount_value(value).ok_or_else(|| {
                    collector.error(
                        index,
                        Some(id),
                        format!("invalid amount for budget category '{}'", key),
                    )
                });
                if let (Ok(category), Ok(amount)) = (category, amount) {
                    categories.insert(category, amount.abs());
                }
            }
        }
        Some(other) => collector.error(
            index,
            Some(id),
            format!("categories must be an object, got {}", other),
        ),
        None => {}
    }

    if collector.errors.len() > errors_before {
        return None;
    }

    Some(Budget {
        id: id.to_string(),
        total_amount,
        categories,
    })
}

fn parse_group(
    id: &str,
    doc: &Map<String, Value>,
    collector: &mut Collector,
    index: usize,
) -> Group {
    let name = string_field(doc, &["name", "title"]).unwrap_or_else(|| {
        collector.error(index, Some(id), "missing name");
        String::new()
    });
    let group_type = string_field(doc, &["type", "groupType", "group_type"])
        .map(|t| GroupType::parse_lenient(&t))
        .unwrap_or_default();

    Group {
        id: id.to_string(),
        name,
        group_type,
    }
}
