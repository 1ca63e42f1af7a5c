//! Streaming chat handler
//!
//! Runs the chat agent against the current dataset snapshot and streams its
//! progress as server-sent UI-message chunks. The agent runs on its own task;
//! dropping the response (client disconnect) aborts it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Local;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{AppError, AppState};
use expensewise_core::ai::{
    new_message_id, system_prompt, AgentEvent, ChatAgent, ChatBackend, ClientSettings, LlmClient,
    Provider, Role, Turn,
};
use expensewise_core::currency::primary_currency;
use expensewise_core::summary::DataSummary;
use expensewise_core::tools::ToolContext;
use expensewise_core::ui_spec::{split_answer, UiSpec};

/// One part of a multi-part UI message
#[derive(Debug, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Plain-text content (older clients)
    #[serde(default)]
    pub content: Option<String>,
    /// UI-message parts; only `text` parts are read
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    fn text(&self) -> String {
        if let Some(content) = self.content.as_deref().filter(|c| !c.is_empty()) {
            return content.to_string();
        }
        self.parts
            .iter()
            .filter(|p| p.part_type == "text")
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub ollama_base_url: Option<String>,
    /// Client-computed description of the data; computed here when absent
    pub data_summary: Option<String>,
}

/// UI-message stream chunk
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatChunk {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    TextDelta { id: String, delta: String },
    UiSpec { spec: UiSpec },
    #[serde(rename_all = "camelCase")]
    Error { error_text: String, retryable: bool },
    Finish,
}

impl From<AgentEvent> for ChatChunk {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::ToolCall { id, name, input } => ChatChunk::ToolCall {
                tool_call_id: id,
                tool_name: name,
                input,
            },
            AgentEvent::ToolResult {
                id,
                name,
                output,
                is_error,
            } => ChatChunk::ToolResult {
                tool_call_id: id,
                tool_name: name,
                output,
                is_error,
            },
        }
    }
}

/// Chunks from the agent task; aborts the task when dropped
struct ChatStream {
    chunks: mpsc::UnboundedReceiver<ChatChunk>,
    task: JoinHandle<()>,
}

impl Stream for ChatStream {
    type Item = Result<Event, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks
            .poll_next_unpin(cx)
            .map(|chunk| chunk.map(|c| Event::default().json_data(c)))
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// POST /api/chat - Stream an answer to the conversation
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let provider = request
        .provider
        .as_deref()
        .unwrap_or(Provider::Ollama.as_str())
        .parse::<Provider>()
        .map_err(|e| AppError::internal(&e))?;

    let settings = ClientSettings {
        provider,
        model: request.model.clone(),
        api_key: request.api_key.clone(),
        ollama_base_url: request.ollama_base_url.clone(),
    };
    let client = LlmClient::from_settings(&settings, &state.config)
        .map_err(|e| AppError::internal(&e.to_string()))?;

    let mut extra_system = Vec::new();
    let mut history = Vec::new();
    for message in &request.messages {
        let text = message.text();
        match Turn::from_role(message.role, text.clone()) {
            Some(turn) => history.push(turn),
            None if !text.trim().is_empty() => extra_system.push(text),
            None => {}
        }
    }
    if history.is_empty() {
        return Err(AppError::internal("No messages provided"));
    }

    let data = state.dataset().await?;
    let today = Local::now().date_naive();
    let summary = match request.data_summary.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => s.to_string(),
        None => DataSummary::from_dataset(&data.dataset).to_prompt_text(),
    };
    let currency = primary_currency(&data.dataset.transactions);

    let mut system = {
        let mut prompts = state
            .prompts
            .lock()
            .map_err(|_| AppError::internal("Prompt library unavailable"))?;
        system_prompt(&mut prompts, &summary, &currency, today)?
    };
    for extra in extra_system {
        system.push_str("\n\n");
        system.push_str(&extra);
    }

    info!(
        provider = %provider,
        model = %client.model(),
        messages = history.len(),
        "Chat request"
    );

    let agent = ChatAgent::new(client).with_max_iterations(state.config.agent.max_iterations);
    let (tx, rx) = mpsc::unbounded();
    let task_state = state.clone();

    let task = tokio::spawn(async move {
        let _ = tx.unbounded_send(ChatChunk::Start {
            message_id: new_message_id(),
        });

        let ctx = ToolContext::new(&data, Some(&task_state.rates), today);
        let mut on_event = |event: AgentEvent| {
            let _ = tx.unbounded_send(ChatChunk::from(event));
        };

        match agent.run(&ctx, &system, history, &mut on_event).await {
            Ok(run) => {
                let answer = split_answer(&run.answer);
                if let Some(reason) = &answer.ui_spec_error {
                    warn!(error = %reason, "Dropped invalid UI spec");
                }
                if !answer.text.is_empty() {
                    let _ = tx.unbounded_send(ChatChunk::TextDelta {
                        id: new_message_id(),
                        delta: answer.text,
                    });
                }
                if let Some(spec) = answer.ui_spec {
                    let _ = tx.unbounded_send(ChatChunk::UiSpec { spec });
                }
            }
            Err(e) => {
                warn!(error = %e, "Chat agent failed");
                let _ = tx.unbounded_send(ChatChunk::Error {
                    error_text: e.to_string(),
                    retryable: true,
                });
            }
        }

        let _ = tx.unbounded_send(ChatChunk::Finish);
    });

    let done = futures::stream::once(async { Ok(Event::default().data("[DONE]")) });
    let stream = ChatStream { chunks: rx, task }.chain(done);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_prefers_content() {
        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": "hello",
            "parts": [{"type": "text", "text": "ignored"}]
        }))
        .unwrap();
        assert_eq!(message.text(), "hello");
    }

    #[test]
    fn test_message_text_joins_text_parts() {
        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "parts": [
                {"type": "text", "text": "How much "},
                {"type": "step-start"},
                {"type": "text", "text": "on food?"}
            ]
        }))
        .unwrap();
        assert_eq!(message.text(), "How much on food?");
    }

    #[test]
    fn test_chunk_wire_format() {
        let chunk = ChatChunk::ToolResult {
            tool_call_id: "call_1".into(),
            tool_name: "account_summary".into(),
            output: "2 accounts".into(),
            is_error: false,
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["type"], "tool-result");
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["isError"], false);

        let error = serde_json::to_value(ChatChunk::Error {
            error_text: "boom".into(),
            retryable: true,
        })
        .unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["errorText"], "boom");

        let finish = serde_json::to_value(ChatChunk::Finish).unwrap();
        assert_eq!(finish, serde_json::json!({"type": "finish"}));
    }
}
