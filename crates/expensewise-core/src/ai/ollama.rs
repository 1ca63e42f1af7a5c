//! Ollama backend (local server or Ollama Cloud)
//!
//! Uses the native `/api/chat` endpoint with `stream: false`. Tool call
//! arguments are JSON objects; tool results go back as `role: "tool"`
//! messages carrying `tool_name`. Ollama Cloud is the same API behind bearer
//! auth.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::openai::{function_tools, FunctionTool};
use super::types::{Completion, ModelInfo, Tool, ToolCall, Turn};
use super::ChatBackend;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
    stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl OllamaMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Convert provider-neutral turns into Ollama chat messages
pub fn to_messages(system: &str, turns: &[Turn]) -> Vec<OllamaMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if !system.is_empty() {
        messages.push(OllamaMessage::text("system", system));
    }
    for turn in turns {
        match turn {
            Turn::User(text) => messages.push(OllamaMessage::text("user", text.clone())),
            Turn::Assistant { text, tool_calls } => messages.push(OllamaMessage {
                role: "assistant".into(),
                content: text.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| OllamaToolCall {
                        function: OllamaFunction {
                            name: call.name.clone(),
                            arguments: call.input.clone(),
                        },
                    })
                    .collect(),
                tool_name: None,
            }),
            Turn::ToolResults(outputs) => {
                messages.extend(outputs.iter().map(|out| OllamaMessage {
                    role: "tool".into(),
                    content: out.content.clone(),
                    tool_calls: Vec::new(),
                    tool_name: Some(out.name.clone()),
                }))
            }
        }
    }
    messages
}

/// Ollama does not assign call ids; derive ones unique within the conversation
pub fn from_message(message: OllamaMessage, turn_count: usize) -> Completion {
    let tool_calls = message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| ToolCall {
            id: format!("call_{}_{}", turn_count, i),
            name: call.function.name,
            input: match call.function.arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            },
        })
        .collect();

    Completion {
        text: message.content,
        tool_calls,
    }
}

/// List models from an Ollama server's `/api/tags`
pub async fn list_models(
    http_client: &Client,
    base_url: &str,
    api_key: Option<&str>,
) -> Result<Vec<ModelInfo>> {
    let mut request = http_client.get(format!("{}/api/tags", base_url.trim_end_matches('/')));
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Provider(format!(
            "Failed to list models ({}): {}",
            status, body
        )));
    }

    let tags: TagsResponse = response.json().await?;
    Ok(tags.models)
}

#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    /// Set for Ollama Cloud
    api_key: Option<String>,
}

impl OllamaBackend {
    /// Local server, no auth
    pub fn new(http_client: Client, base_url: &str, model: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Hosted Ollama with bearer auth
    pub fn cloud(http_client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(http_client, base_url, model)
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        list_models(&self.http_client, &self.base_url, self.api_key.as_deref()).await
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn complete(&self, system: &str, turns: &[Turn], tools: &[Tool]) -> Result<Completion> {
        let request = ChatRequest {
            model: &self.model,
            messages: to_messages(system, turns),
            tools: function_tools(tools),
            stream: false,
        };

        debug!(
            model = %self.model,
            host = %self.base_url,
            tools = tools.len(),
            turns = turns.len(),
            "Sending Ollama chat request"
        );

        let mut builder = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("Ollama error ({}): {}", status, body)));
        }

        let chat: ChatResponse = response.json().await?;
        Ok(from_message(chat.message, turns.len()))
    }

    async fn health_check(&self) -> bool {
        self.list_models().await.is_ok()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
