//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod accounts;
pub mod chat;
pub mod dashboard;
pub mod data;
pub mod models;
pub mod tools;
pub mod transactions;

// Re-export all handlers for use in router
pub use accounts::*;
pub use chat::*;
pub use dashboard::*;
pub use data::*;
pub use models::*;
pub use tools::*;
pub use transactions::*;
