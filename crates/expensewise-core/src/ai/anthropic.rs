//! Anthropic Messages API backend
//!
//! Speaks `POST {base}/v1/messages` with native `tool_use` / `tool_result`
//! content blocks.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{Completion, Tool, ToolCall, Turn};
use super::ChatBackend;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    #[serde(skip_serializing_if = "<[Tool]>::is_empty")]
    pub tools: &'a [Tool],
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    fn blocks(role: &str, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message content (text or blocks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Block types this client does not use (thinking, etc.)
    #[serde(other)]
    Unsupported,
}

/// Anthropic Messages API response
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    pub fn tool_uses(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_completion(self) -> Completion {
        Completion {
            text: self.text(),
            tool_calls: self.tool_uses(),
        }
    }
}

/// Convert provider-neutral turns into Anthropic messages
pub fn to_messages(turns: &[Turn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| match turn {
            Turn::User(text) => Message::user(text.clone()),
            Turn::Assistant { text, tool_calls } if tool_calls.is_empty() => {
                Message::assistant(text.clone())
            }
            Turn::Assistant { text, tool_calls } => {
                let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
                if !text.is_empty() {
                    blocks.push(ContentBlock::Text { text: text.clone() });
                }
                blocks.extend(tool_calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                }));
                Message::blocks("assistant", blocks)
            }
            Turn::ToolResults(outputs) => Message::blocks(
                "user",
                outputs
                    .iter()
                    .map(|out| ContentBlock::ToolResult {
                        tool_use_id: out.call_id.clone(),
                        content: out.content.clone(),
                        is_error: out.is_error.then_some(true),
                    })
                    .collect(),
            ),
        })
        .collect()
}

#[derive(Clone)]
pub struct AnthropicBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(http_client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    async fn complete(&self, system: &str, turns: &[Turn], tools: &[Tool]) -> Result<Completion> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: to_messages(turns),
            system: (!system.is_empty()).then_some(system),
            tools,
        };

        debug!(model = %self.model, tools = tools.len(), turns = turns.len(), "Sending Anthropic request");

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Anthropic API error ({}): {}",
                status, body
            )));
        }

        let messages_response: MessagesResponse = response.json().await?;
        debug!(stop_reason = ?messages_response.stop_reason, "Received Anthropic response");
        Ok(messages_response.into_completion())
    }

    async fn health_check(&self) -> bool {
        // No cheap unauthenticated endpoint; treat a configured key as healthy
        !self.api_key.is_empty()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
