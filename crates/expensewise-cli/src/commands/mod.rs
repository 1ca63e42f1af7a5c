//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, load_config, confirm)
//! - `import` - Import and clear commands
//! - `status` - Status and dashboard commands
//! - `search` - Transaction search and direct tool runs
//! - `chat` - One-shot chat with tool calling
//! - `serve` - Web server command

pub mod chat;
pub mod core;
pub mod import;
pub mod search;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use chat::*;
pub use core::*;
pub use import::*;
pub use search::*;
pub use serve::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
