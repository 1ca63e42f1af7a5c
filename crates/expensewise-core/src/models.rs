//! Domain models for Expense-Wise
//!
//! All entities are created by a one-shot import of a mobile app export and
//! are read-only afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Transaction type. Amounts are stored as magnitudes; the type carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Expense,
    Income,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "Expense",
            Self::Income => "Income",
            Self::Transfer => "Transfer",
        }
    }

    /// Sign used when a signed amount is needed for display
    pub fn sign(&self) -> f64 {
        match self {
            Self::Expense => -1.0,
            Self::Income => 1.0,
            Self::Transfer => 0.0,
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" | "expenses" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed category enumeration used to bucket transactions and budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    FoodGroceries,
    FoodDining,
    Transportation,
    Housing,
    Utilities,
    Healthcare,
    Entertainment,
    Shopping,
    Travel,
    Education,
    PersonalCare,
    Insurance,
    Subscriptions,
    GiftsDonations,
    Investments,
    Salary,
    OtherIncome,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodGroceries => "FOOD_GROCERIES",
            Self::FoodDining => "FOOD_DINING",
            Self::Transportation => "TRANSPORTATION",
            Self::Housing => "HOUSING",
            Self::Utilities => "UTILITIES",
            Self::Healthcare => "HEALTHCARE",
            Self::Entertainment => "ENTERTAINMENT",
            Self::Shopping => "SHOPPING",
            Self::Travel => "TRAVEL",
            Self::Education => "EDUCATION",
            Self::PersonalCare => "PERSONAL_CARE",
            Self::Insurance => "INSURANCE",
            Self::Subscriptions => "SUBSCRIPTIONS",
            Self::GiftsDonations => "GIFTS_DONATIONS",
            Self::Investments => "INVESTMENTS",
            Self::Salary => "SALARY",
            Self::OtherIncome => "OTHER_INCOME",
            Self::Other => "OTHER",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::FoodGroceries => "Groceries",
            Self::FoodDining => "Dining Out",
            Self::Transportation => "Transportation",
            Self::Housing => "Housing",
            Self::Utilities => "Utilities",
            Self::Healthcare => "Healthcare",
            Self::Entertainment => "Entertainment",
            Self::Shopping => "Shopping",
            Self::Travel => "Travel",
            Self::Education => "Education",
            Self::PersonalCare => "Personal Care",
            Self::Insurance => "Insurance",
            Self::Subscriptions => "Subscriptions",
            Self::GiftsDonations => "Gifts & Donations",
            Self::Investments => "Investments",
            Self::Salary => "Salary",
            Self::OtherIncome => "Other Income",
            Self::Other => "Other",
        }
    }

    pub fn all() -> &'static [Category] {
        &[
            Self::FoodGroceries,
            Self::FoodDining,
            Self::Transportation,
            Self::Housing,
            Self::Utilities,
            Self::Healthcare,
            Self::Entertainment,
            Self::Shopping,
            Self::Travel,
            Self::Education,
            Self::PersonalCare,
            Self::Insurance,
            Self::Subscriptions,
            Self::GiftsDonations,
            Self::Investments,
            Self::Salary,
            Self::OtherIncome,
            Self::Other,
        ]
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    /// Accepts the wire key (`FOOD_GROCERIES`), any casing of it, or the label
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_uppercase().replace([' ', '-'], "_");
        Category::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == key || c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Group types for shared expenses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Trip,
    Home,
    Couple,
    #[default]
    Other,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Home => "home",
            Self::Couple => "couple",
            Self::Other => "other",
        }
    }

    /// Lenient parse; unknown values become `Other`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trip" | "travel" => Self::Trip,
            "home" | "household" => Self::Home,
            "couple" | "partner" => Self::Couple,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An imported transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Non-negative magnitude
    pub amount: f64,
    /// ISO-4217 code, uppercase
    pub currency: String,
    #[serde(rename = "categoryId")]
    pub category: Category,
    pub account_id: String,
    pub description: String,
    pub date: NaiveDate,
    pub group_id: Option<String>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.tx_type == TransactionType::Expense
    }

    pub fn is_income(&self) -> bool {
        self.tx_type == TransactionType::Income
    }

    /// Amount with the sign implied by the transaction type
    pub fn signed_amount(&self) -> f64 {
        self.amount * self.tx_type.sign()
    }
}

/// An account (wallet, bank account, card)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub country: Option<String>,
    pub balance: f64,
    /// Month key (YYYY-MM) to balance at the end of that month
    pub monthly_balance: BTreeMap<String, f64>,
}

/// A budget with per-category monthly amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub total_amount: f64,
    pub categories: BTreeMap<Category, f64>,
}

/// A tag for shared expenses (trip, household, couple)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
}

/// Metadata recorded for the most recent successful import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMetadata {
    pub user_id: Option<String>,
    pub app_version: Option<String>,
    pub backed_up_at: Option<String>,
    pub imported_at: DateTime<Utc>,
    /// SHA-256 of the raw export bytes
    pub fingerprint: String,
    pub stats: ImportStats,
}

/// Counts of entities written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub transactions: usize,
    pub accounts: usize,
    pub budgets: usize,
    pub groups: usize,
}

impl ImportStats {
    pub fn total(&self) -> usize {
        self.transactions + self.accounts + self.budgets + self.groups
    }
}

/// Everything stored, loaded into memory for analytics, search and tools
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    pub budgets: Vec<Budget>,
    pub groups: Vec<Group>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.accounts.is_empty()
            && self.budgets.is_empty()
            && self.groups.is_empty()
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// The budget used for dashboard comparisons (the first one imported)
    pub fn primary_budget(&self) -> Option<&Budget> {
        self.budgets.first()
    }

    /// Earliest and latest transaction dates
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.transactions.iter().map(|t| t.date).min()?;
        let max = self.transactions.iter().map(|t| t.date).max()?;
        Some((min, max))
    }

    /// Resolve an account by id or case-insensitive name
    pub fn resolve_account(&self, key: &str) -> Option<&Account> {
        self.account(key)
            .or_else(|| self.accounts.iter().find(|a| a.name.eq_ignore_ascii_case(key)))
    }

    /// Resolve a group by id or case-insensitive name
    pub fn resolve_group(&self, key: &str) -> Option<&Group> {
        self.group(key)
            .or_else(|| self.groups.iter().find(|g| g.name.eq_ignore_ascii_case(key)))
    }
}
