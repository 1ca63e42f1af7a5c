//! Chat agent with tool calling
//!
//! ```text
//!   1. Send system prompt + conversation + tool catalog to the provider
//!   2. If the reply calls tools (native blocks or <function=...> text):
//!      a. Run each tool against the in-memory dataset
//!      b. Append the results to the conversation
//!      c. Repeat until a plain answer or max_iterations
//!   3. Return the final text and every tool call made
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};
use crate::tools::{execute_tool, tool_definitions, ToolContext};

use super::parsing::{parse_text_tool_calls, strip_text_tool_calls};
use super::types::{ToolCall, ToolOutput, Turn};
use super::{ChatBackend, LlmClient};

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Record of a tool call made during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub success: bool,
    /// Output or error message
    pub output: String,
}

/// Progress reported while the agent runs
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        id: String,
        name: String,
        output: String,
        is_error: bool,
    },
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: usize,
}

pub struct ChatAgent {
    client: LlmClient,
    max_iterations: usize,
}

impl ChatAgent {
    pub fn new(client: LlmClient) -> Self {
        Self {
            client,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    /// Run the tool loop over `history` (which ends with the user's question)
    pub async fn run(
        &self,
        ctx: &ToolContext<'_>,
        system: &str,
        history: Vec<Turn>,
        on_event: &mut (dyn FnMut(AgentEvent) + Send),
    ) -> Result<AgentRun> {
        let tools = tool_definitions();
        let mut turns = history;
        let mut records: Vec<ToolCallRecord> = Vec::new();

        info!(
            model = %self.client.model(),
            tools = tools.len(),
            history_len = turns.len(),
            "Starting chat agent"
        );

        for iteration in 0..self.max_iterations {
            debug!(iteration, "Agent iteration");
            let completion = self.client.complete(system, &turns, &tools).await?;

            if completion.has_tool_calls() {
                let calls = completion.tool_calls;
                turns.push(Turn::Assistant {
                    text: completion.text,
                    tool_calls: calls.clone(),
                });
                let outputs = run_calls(ctx, &calls, &mut records, on_event);
                turns.push(Turn::ToolResults(outputs));
                continue;
            }

            // Some models write tool calls as text, even with end_turn
            let text_calls = parse_text_tool_calls(&completion.text);
            if text_calls.is_empty() {
                info!(iteration, tool_calls = records.len(), "Chat agent complete");
                return Ok(AgentRun {
                    answer: completion.text.trim().to_string(),
                    tool_calls: records,
                    iterations: iteration + 1,
                });
            }

            info!(iteration, count = text_calls.len(), "Found text tool calls");
            let preamble = strip_text_tool_calls(&completion.text);
            if !preamble.is_empty() {
                turns.push(Turn::assistant(preamble));
            }

            let calls: Vec<ToolCall> = text_calls
                .into_iter()
                .enumerate()
                .map(|(i, call)| ToolCall {
                    id: format!("text_call_{}_{}", iteration, i),
                    name: call.name,
                    input: call.input,
                })
                .collect();
            let outputs = run_calls(ctx, &calls, &mut records, on_event);
            let formatted: Vec<String> = outputs
                .iter()
                .enumerate()
                .map(|(i, out)| {
                    let label = if out.is_error { "error" } else { "result" };
                    format!("Tool {} ({}) {}:\n{}", i + 1, out.name, label, out.content)
                })
                .collect();
            turns.push(Turn::user(format!(
                "Here are the results from the tools you requested:\n\n{}",
                formatted.join("\n\n")
            )));
        }

        warn!(max_iterations = self.max_iterations, "Chat agent hit max iterations");
        Err(Error::Provider(format!(
            "No final answer after {} iterations",
            self.max_iterations
        )))
    }
}

/// Execute calls in order; failures become error results for the model
fn run_calls(
    ctx: &ToolContext<'_>,
    calls: &[ToolCall],
    records: &mut Vec<ToolCallRecord>,
    on_event: &mut (dyn FnMut(AgentEvent) + Send),
) -> Vec<ToolOutput> {
    calls
        .iter()
        .map(|call| {
            on_event(AgentEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });

            let (content, is_error) = match execute_tool(ctx, &call.name, &call.input) {
                Ok(output) => {
                    debug!(tool = %call.name, output_len = output.len(), "Tool succeeded");
                    (output, false)
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool failed");
                    (e.to_string(), true)
                }
            };

            on_event(AgentEvent::ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                output: content.clone(),
                is_error,
            });
            records.push(ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
                success: !is_error,
                output: content.clone(),
            });

            ToolOutput {
                call_id: call.id.clone(),
                name: call.name.clone(),
                content,
                is_error,
            }
        })
        .collect()
}

/// Render the chat system prompt for the imported data
pub fn system_prompt(
    prompts: &mut PromptLibrary,
    data_summary: &str,
    currency: &str,
    today: chrono::NaiveDate,
) -> Result<String> {
    let prompt = prompts.get(PromptId::ChatAgent)?;
    let today = today.to_string();
    let vars = HashMap::from([
        ("data_summary", data_summary.trim()),
        ("currency", currency),
        ("today", today.as_str()),
    ]);
    Ok(prompt.render_system(&vars))
}

/// Fresh identifier for a streamed assistant message
pub fn new_message_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = chrono::Utc::now();
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(n.to_le_bytes());
    format!("msg_{}", &hex::encode(hasher.finalize())[..24])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::{Account, Category, Dataset, Transaction, TransactionType};
    use crate::search::IndexedDataset;
    use chrono::NaiveDate;
    use serde_json::json;

    fn data() -> IndexedDataset {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        IndexedDataset::new(Dataset {
            transactions: vec![Transaction {
                id: "t1".into(),
                tx_type: TransactionType::Expense,
                amount: 4.5,
                currency: "EUR".into(),
                category: Category::FoodDining,
                account_id: "a1".into(),
                description: "Coffee at Bean Bar".into(),
                date,
                group_id: None,
            }],
            accounts: vec![Account {
                id: "a1".into(),
                name: "Main".into(),
                currency: "EUR".into(),
                country: None,
                balance: 100.0,
                monthly_balance: Default::default(),
            }],
            budgets: vec![],
            groups: vec![],
        })
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    #[tokio::test]
    async fn test_native_tool_call_loop() {
        let mock = MockBackend::new()
            .call_tool("search_transactions", json!({"query": "coffee"}))
            .reply("You spent 4.50 EUR on coffee.");
        let agent = ChatAgent::new(LlmClient::mock(mock.clone()));
        let data = data();
        let ctx = ToolContext::new(&data, None, today());

        let mut events = Vec::new();
        let run = agent
            .run(&ctx, "sys", vec![Turn::user("Coffee?")], &mut |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(run.answer, "You spent 4.50 EUR on coffee.");
        assert_eq!(run.iterations, 2);
        assert_eq!(run.tool_calls.len(), 1);
        assert!(run.tool_calls[0].success);
        assert!(run.tool_calls[0].output.contains("Coffee at Bean Bar"));
        assert!(matches!(events[0], AgentEvent::ToolCall { ref name, .. } if name == "search_transactions"));
        assert!(matches!(events[1], AgentEvent::ToolResult { is_error: false, .. }));

        // second request carries the tool round trip
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tool_names.len(), 6);
        assert!(matches!(requests[1].turns[2], Turn::ToolResults(ref outs) if outs.len() == 1));
    }

    #[tokio::test]
    async fn test_text_tool_calls_are_executed() {
        let mock = MockBackend::new()
            .reply("Let me check.\n<function=account_summary>\n</function>")
            .reply("You have one account.");
        let agent = ChatAgent::new(LlmClient::mock(mock.clone()));
        let data = data();
        let ctx = ToolContext::new(&data, None, today());

        let run = agent
            .run(&ctx, "sys", vec![Turn::user("Accounts?")], &mut |_| {})
            .await
            .unwrap();
        assert_eq!(run.answer, "You have one account.");
        assert_eq!(run.tool_calls[0].name, "account_summary");
        assert_eq!(run.tool_calls[0].id, "text_call_0_0");

        let second = &mock.requests()[1].turns;
        assert_eq!(second[1], Turn::assistant("Let me check."));
        assert!(matches!(second[2], Turn::User(ref text) if text.contains("Tool 1 (account_summary) result")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_not_fatal() {
        let mock = MockBackend::new()
            .call_tool("delete_everything", json!({}))
            .reply("Sorry.");
        let agent = ChatAgent::new(LlmClient::mock(mock));
        let data = data();
        let ctx = ToolContext::new(&data, None, today());

        let run = agent
            .run(&ctx, "", vec![Turn::user("?")], &mut |_| {})
            .await
            .unwrap();
        assert_eq!(run.answer, "Sorry.");
        assert!(!run.tool_calls[0].success);
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let mut mock = MockBackend::new();
        for _ in 0..3 {
            mock = mock.call_tool("account_summary", json!({}));
        }
        let agent = ChatAgent::new(LlmClient::mock(mock)).with_max_iterations(2);
        let data = data();
        let ctx = ToolContext::new(&data, None, today());

        let err = agent
            .run(&ctx, "", vec![Turn::user("?")], &mut |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2 iterations"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let agent = ChatAgent::new(LlmClient::mock(MockBackend::new().fail("rate limited")));
        let data = data();
        let ctx = ToolContext::new(&data, None, today());
        let err = agent
            .run(&ctx, "", vec![Turn::user("?")], &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_system_prompt_renders_variables() {
        let mut prompts = PromptLibrary::embedded_only();
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let system = system_prompt(&mut prompts, "Transactions: 12", "EUR", today).unwrap();
        assert!(system.contains("Today is 2024-03-31"));
        assert!(system.contains("EUR"));
        assert!(system.contains("Transactions: 12"));
        assert!(!system.contains("{{"));

        let empty = system_prompt(&mut prompts, "", "EUR", today).unwrap();
        assert!(!empty.contains("## Imported data"));
    }

    #[test]
    fn test_message_ids_unique() {
        let a = new_message_id();
        let b = new_message_id();
        assert!(a.starts_with("msg_"));
        assert_eq!(a.len(), 28);
        assert_ne!(a, b);
    }
}
