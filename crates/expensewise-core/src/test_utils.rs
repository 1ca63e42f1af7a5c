//! Test utilities for expensewise-core
//!
//! A mock LLM server speaking the three wire formats the chat agent uses
//! (Ollama `/api/chat`, OpenAI `/v1/chat/completions`, Anthropic
//! `/v1/messages`). Replies are scripted from the last message:
//!
//! - `use <tool>` asks for a native tool call to `<tool>` with `{}` input
//! - `xml <tool>` writes a `<function=<tool>>` call as plain text
//! - `chart` answers with a small `ui-spec` block
//! - after tool results, the first line of the first result is echoed back
//! - anything else is echoed as `Mock reply: <text>`
//!
//! The API key `bad-key` gets 401 on every endpoint.

use axum::{
    extract::Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::oneshot;

pub const BAD_API_KEY: &str = "bad-key";

/// Mock LLM server for testing and development
pub struct MockLlmServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/chat", post(handle_ollama_chat))
            .route("/v1/models", get(handle_openai_models))
            .route("/v1/chat/completions", post(handle_openai_chat))
            .route("/v1/messages", post(handle_anthropic_messages));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// What the scripted model decided to do
#[derive(Debug, PartialEq)]
enum Reply {
    Text(String),
    Call(String),
}

/// The parts of a conversation the script looks at
#[derive(Debug, Default)]
struct View {
    last_user: String,
    /// First tool result when the conversation ends with tool results
    tool_result: Option<String>,
}

fn script(view: &View) -> Reply {
    if let Some(result) = &view.tool_result {
        return Reply::Text(format!("Here is what I found: {}", first_line(result)));
    }
    if let Some(rest) = view
        .last_user
        .strip_prefix("Here are the results from the tools you requested:")
    {
        // Text tool call results: skip the "Tool 1 (name) result:" header
        let body = rest.trim().lines().nth(1).unwrap_or_default();
        return Reply::Text(format!("Here is what I found: {}", body.trim()));
    }

    let lower = view.last_user.to_lowercase();
    if let Some(tool) = word_after(&lower, "use ") {
        return Reply::Call(tool);
    }
    if let Some(tool) = word_after(&lower, "xml ") {
        return Reply::Text(format!("Let me look that up.\n<function={}>\n</function>", tool));
    }
    if lower.contains("chart") {
        return Reply::Text(
            "Spending is steady.\n\n```ui-spec\n\
             {\"op\":\"add\",\"path\":\"/root\",\"value\":{\"type\":\"Card\",\"props\":{\"title\":\"Spending\"},\"children\":[]}}\n\
             {\"op\":\"add\",\"path\":\"/root/children/-\",\"value\":{\"type\":\"Metric\",\"props\":{\"label\":\"Total\",\"value\":\"42\"}}}\n\
             ```"
                .to_string(),
        );
    }
    Reply::Text(format!("Mock reply: {}", view.last_user))
}

fn word_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let word: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    (!word.is_empty()).then_some(word)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

fn bad_key(headers: &HeaderMap) -> bool {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", BAD_API_KEY))
        .unwrap_or(false);
    let x_api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == BAD_API_KEY)
        .unwrap_or(false);
    bearer || x_api_key
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"}))).into_response()
}

fn text_of(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

/// Ollama tags endpoint (model list and health check)
async fn handle_tags(headers: HeaderMap) -> Response {
    if bad_key(&headers) {
        return unauthorized();
    }
    Json(json!({
        "models": [
            {"name": "llama3.1:latest", "size": 4_000_000_000_u64, "modified_at": "2024-01-01T00:00:00Z"},
            {"name": "qwen2.5:7b", "size": 4_500_000_000_u64, "modified_at": "2024-02-01T00:00:00Z"}
        ]
    }))
    .into_response()
}

/// View of Ollama and OpenAI style message lists (`role: "tool"` results)
fn chat_view(messages: &[Value]) -> View {
    let mut view = View::default();
    if let Some(last) = messages.last() {
        if last["role"] == "tool" {
            let first_result = messages
                .iter()
                .rev()
                .take_while(|m| m["role"] == "tool")
                .last()
                .map(|m| text_of(&m["content"]));
            view.tool_result = first_result;
        }
    }
    if let Some(user) = messages.iter().rev().find(|m| m["role"] == "user") {
        view.last_user = text_of(&user["content"]);
    }
    view
}

async fn handle_ollama_chat(headers: HeaderMap, Json(request): Json<Value>) -> Response {
    if bad_key(&headers) {
        return unauthorized();
    }
    let messages = request["messages"].as_array().cloned().unwrap_or_default();
    let message = match script(&chat_view(&messages)) {
        Reply::Text(text) => json!({"role": "assistant", "content": text}),
        Reply::Call(name) => json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": name, "arguments": {}}}]
        }),
    };
    Json(json!({
        "model": request["model"],
        "message": message,
        "done": true
    }))
    .into_response()
}

async fn handle_openai_models(headers: HeaderMap) -> Response {
    if bad_key(&headers) {
        return unauthorized();
    }
    Json(json!({"data": [{"id": "gpt-4o-mini"}]})).into_response()
}

async fn handle_openai_chat(headers: HeaderMap, Json(request): Json<Value>) -> Response {
    if bad_key(&headers) {
        return unauthorized();
    }
    let messages = request["messages"].as_array().cloned().unwrap_or_default();
    let message = match script(&chat_view(&messages)) {
        Reply::Text(text) => json!({"role": "assistant", "content": text}),
        Reply::Call(name) => json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": format!("call_{}", messages.len()),
                "type": "function",
                "function": {"name": name, "arguments": "{}"}
            }]
        }),
    };
    Json(json!({
        "id": "chatcmpl-mock",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}]
    }))
    .into_response()
}

/// View of an Anthropic message list (`tool_result` blocks in user turns)
fn anthropic_view(messages: &[Value]) -> View {
    let mut view = View::default();
    if let Some(Value::Array(blocks)) = messages.last().map(|m| &m["content"]) {
        view.tool_result = blocks
            .iter()
            .find(|b| b["type"] == "tool_result")
            .map(|b| text_of(&b["content"]));
    }
    view.last_user = messages
        .iter()
        .rev()
        .filter(|m| m["role"] == "user")
        .find_map(|m| match &m["content"] {
            Value::String(text) => Some(text.clone()),
            Value::Array(blocks) => blocks
                .iter()
                .find(|b| b["type"] == "text")
                .map(|b| text_of(&b["text"])),
            _ => None,
        })
        .unwrap_or_default();
    view
}

async fn handle_anthropic_messages(headers: HeaderMap, Json(request): Json<Value>) -> Response {
    if bad_key(&headers) {
        return unauthorized();
    }
    let messages = request["messages"].as_array().cloned().unwrap_or_default();
    let (content, stop_reason) = match script(&anthropic_view(&messages)) {
        Reply::Text(text) => (json!([{"type": "text", "text": text}]), "end_turn"),
        Reply::Call(name) => (
            json!([{
                "type": "tool_use",
                "id": format!("toolu_{}", messages.len()),
                "name": name,
                "input": {}
            }]),
            "tool_use",
        ),
    };
    Json(json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "content": content,
        "stop_reason": stop_reason
    }))
    .into_response()
}
