//! Expense-Wise Core Library
//!
//! Shared functionality for the Expense-Wise spending dashboard:
//! - Export import with validation and locale-aware amount parsing
//! - Database access and migrations
//! - Dashboard aggregation, budgets and currency conversion
//! - Full-text search over an in-memory snapshot
//! - Chat agent with pluggable LLM backends (Ollama, OpenAI, Anthropic)
//! - Prompt library and configuration

pub mod ai;
pub mod budget;
pub mod config;
pub mod currency;
pub mod db;
pub mod error;
pub mod filters;
pub mod import;
pub mod models;
pub mod prompts;
pub mod search;
pub mod stats;
pub mod summary;
pub mod tools;
pub mod ui_spec;

/// Test utilities including a mock LLM server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AgentEvent, AgentRun, ChatAgent, ChatBackend, ClientSettings, LlmClient, MockBackend,
    Provider, Role, Tool, ToolCallRecord, Turn,
};
pub use config::AppConfig;
pub use currency::ExchangeRates;
pub use db::{Database, TransactionFilter};
pub use error::{Error, Result};
pub use filters::{DashboardFilters, DateRange, RangePreset};
pub use import::{parse_export, ImportBundle};
pub use models::{
    Account, Budget, Category, Dataset, Group, GroupType, ImportMetadata, ImportStats,
    Transaction, TransactionType,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use search::{IndexedDataset, SearchIndex};
pub use stats::DashboardStats;
pub use summary::DataSummary;
pub use tools::ToolContext;
pub use ui_spec::{split_answer, UiSpec};
