//! Mock backend for testing
//!
//! Replays a script of completions in order and records every request.
//! Once the script runs out it echoes the last user message.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::{Completion, Tool, ToolCall, Turn};
use super::ChatBackend;

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub system: String,
    pub turns: Vec<Turn>,
    pub tool_names: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<std::result::Result<Completion, String>>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self::default()
    }

    /// Queue a plain text reply
    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(Completion::text(text)))
    }

    /// Queue a reply that calls one tool
    pub fn call_tool(self, name: &str, input: serde_json::Value) -> Self {
        let id = format!("mock_call_{}", self.script_len());
        self.push(Ok(Completion {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id,
                name: name.to_string(),
                input,
            }],
        }))
    }

    /// Queue a provider failure
    pub fn fail(self, message: &str) -> Self {
        self.push(Err(message.to_string()))
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn script_len(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn push(self, entry: std::result::Result<Completion, String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
        self
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, system: &str, turns: &[Turn], tools: &[Tool]) -> Result<Completion> {
        self.requests
            .lock()
            .map_err(|_| Error::Provider("mock request log poisoned".into()))?
            .push(MockRequest {
                system: system.to_string(),
                turns: turns.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });

        let next = self
            .script
            .lock()
            .map_err(|_| Error::Provider("mock script poisoned".into()))?
            .pop_front();

        match next {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(Error::Provider(message)),
            None => {
                let last_user = turns
                    .iter()
                    .rev()
                    .find_map(|t| match t {
                        Turn::User(text) => Some(text.as_str()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ok(Completion::text(format!("Mock reply: {}", last_user)))
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_then_echo() {
        let mock = MockBackend::new()
            .call_tool("account_summary", json!({}))
            .reply("Done.");

        let turns = vec![Turn::user("hello")];
        let first = mock.complete("sys", &turns, &[]).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "account_summary");
        assert_eq!(first.tool_calls[0].id, "mock_call_0");
        assert_eq!(mock.complete("sys", &turns, &[]).await.unwrap().text, "Done.");
        assert_eq!(
            mock.complete("sys", &turns, &[]).await.unwrap().text,
            "Mock reply: hello"
        );
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let mock = MockBackend::new().fail("boom");
        let err = mock.complete("", &[], &[]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_health() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
