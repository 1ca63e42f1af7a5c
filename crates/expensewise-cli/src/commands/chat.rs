//! Chat command: one question, answered with tool calls against local data

use anyhow::{Context, Result};
use chrono::Local;
use expensewise_core::{
    ai::{system_prompt, AgentEvent, AgentRun, ChatAgent, ChatBackend, ClientSettings, LlmClient},
    config::AppConfig,
    currency::primary_currency,
    db::Database,
    search::IndexedDataset,
    summary::DataSummary,
    tools::ToolContext,
    ui_spec::split_answer,
    ExchangeRates, PromptLibrary, Provider, Turn,
};
use tracing::debug;

use super::truncate;
use crate::cli::ChatArgs;

pub async fn cmd_chat(
    db: &Database,
    config: &AppConfig,
    rates: &ExchangeRates,
    args: &ChatArgs,
) -> Result<()> {
    let provider: Provider = args.provider.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let settings = ClientSettings {
        provider,
        model: args.model.clone(),
        api_key: args.api_key.clone(),
        ollama_base_url: args.ollama_url.clone(),
    };
    let client = LlmClient::from_settings(&settings, config)?;
    println!("🤖 {} ({})", client.model(), provider);

    let question = args.message.join(" ");
    tokio::select! {
        result = run_chat(client, db, config, rates, &question) => {
            let run = result?;
            print_answer(&run);
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Cancelled.");
        }
    }
    Ok(())
}

/// Run the agent over the stored data, printing tool activity as it happens
pub async fn run_chat(
    client: LlmClient,
    db: &Database,
    config: &AppConfig,
    rates: &ExchangeRates,
    question: &str,
) -> Result<AgentRun> {
    let data = IndexedDataset::new(db.load_dataset()?);
    let today = Local::now().date_naive();
    let currency = primary_currency(&data.dataset.transactions);
    let summary = DataSummary::from_dataset(&data.dataset).to_prompt_text();

    let mut prompts = PromptLibrary::new();
    let system = system_prompt(&mut prompts, &summary, &currency, today)?;
    debug!(chars = system.len(), "Rendered system prompt");

    let ctx = ToolContext::new(&data, Some(rates), today);
    let agent = ChatAgent::new(client).with_max_iterations(config.agent.max_iterations);

    let mut on_event = |event: AgentEvent| match event {
        AgentEvent::ToolCall { name, input, .. } => {
            println!("   🔧 {} {}", name, input);
        }
        AgentEvent::ToolResult {
            name,
            output,
            is_error,
            ..
        } => {
            let first = output.lines().next().unwrap_or_default();
            if is_error {
                println!("   ❌ {}: {}", name, truncate(first, 70));
            } else {
                println!("   ✓ {}: {}", name, truncate(first, 70));
            }
        }
    };

    agent
        .run(&ctx, &system, vec![Turn::user(question)], &mut on_event)
        .await
        .context("Chat failed")
}

fn print_answer(run: &AgentRun) {
    let answer = split_answer(&run.answer);
    println!();
    println!("{}", answer.text);
    if let Some(spec) = &answer.ui_spec {
        match serde_json::to_string_pretty(spec) {
            Ok(json) => {
                println!();
                println!("📈 Visualization (render in the web dashboard):");
                println!("{}", json);
            }
            Err(e) => debug!(error = %e, "Could not format UI spec"),
        }
    }
    println!();
}
