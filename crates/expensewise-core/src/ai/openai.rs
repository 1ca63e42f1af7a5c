//! OpenAI chat completions backend
//!
//! Works with `POST {base}/v1/chat/completions`. Tool call arguments travel
//! as JSON-encoded strings and tool results as `role: "tool"` messages.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::{Completion, Tool, ToolCall, Turn};
use super::ChatBackend;

/// Function tool definition shared by OpenAI and Ollama
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FunctionTool<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FunctionSpec<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parameters: &'a Value,
}

pub(crate) fn function_tools(tools: &[Tool]) -> Vec<FunctionTool<'_>> {
    tools
        .iter()
        .map(|tool| FunctionTool {
            kind: "function",
            function: FunctionSpec {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.input_schema,
            },
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: WireFunction,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFunction {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Convert provider-neutral turns into chat completion messages
pub fn to_messages(system: &str, turns: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if !system.is_empty() {
        messages.push(ChatMessage::text("system", system));
    }
    for turn in turns {
        match turn {
            Turn::User(text) => messages.push(ChatMessage::text("user", text.clone())),
            Turn::Assistant { text, tool_calls } => messages.push(ChatMessage {
                role: "assistant".into(),
                content: (!text.is_empty() || tool_calls.is_empty()).then(|| text.clone()),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: function_kind(),
                        function: WireFunction {
                            name: call.name.clone(),
                            arguments: call.input.to_string(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
            }),
            Turn::ToolResults(outputs) => {
                messages.extend(outputs.iter().map(|out| ChatMessage {
                    role: "tool".into(),
                    content: Some(out.content.clone()),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(out.call_id.clone()),
                }))
            }
        }
    }
    messages
}

/// Decode a response message; undecodable arguments are passed through as a
/// string so the tool reports the problem to the model
pub fn from_message(message: ChatMessage) -> Completion {
    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let input = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                    warn!(tool = %call.function.name, error = %e, "Undecodable tool arguments");
                    Value::String(call.function.arguments.clone())
                })
            };
            ToolCall {
                id: call.id,
                name: call.function.name,
                input,
            }
        })
        .collect();

    Completion {
        text: message.content.unwrap_or_default(),
        tool_calls,
    }
}

#[derive(Clone)]
pub struct OpenAIBackend {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIBackend {
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
impl ChatBackend for OpenAIBackend {
    async fn complete(&self, system: &str, turns: &[Turn], tools: &[Tool]) -> Result<Completion> {
        let request = ChatRequest {
            model: &self.model,
            messages: to_messages(system, turns),
            tools: function_tools(tools),
        };

        debug!(model = %self.model, tools = tools.len(), turns = turns.len(), "Sending OpenAI request");

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("OpenAI API error ({}): {}", status, body)));
        }

        let chat: ChatResponse = response.json().await?;
        let message = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("OpenAI response had no choices".into()))?;
        Ok(from_message(message.message))
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
