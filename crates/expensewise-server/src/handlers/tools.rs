//! Direct tool execution handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{AppError, AppState};
use expensewise_core::ai::Tool;
use expensewise_core::tools::{execute_tool, tool_definitions, ToolContext};

/// GET /api/tools - Tool catalog offered to the chat model
pub async fn list_tools() -> Json<Vec<Tool>> {
    Json(tool_definitions())
}

#[derive(Serialize)]
pub struct ToolOutput {
    pub output: String,
}

/// POST /api/tools/:name - Run a tool against the stored data
pub async fn run_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<ToolOutput>, AppError> {
    let input = body.map(|Json(v)| v).unwrap_or_else(|| Value::Object(Default::default()));
    debug!(tool = %name, %input, "Running tool");

    let data = state.dataset().await?;
    let ctx = ToolContext::new(&data, Some(&state.rates), Local::now().date_naive());
    let output = execute_tool(&ctx, &name, &input).map_err(AppError::from_core)?;

    Ok(Json(ToolOutput { output }))
}
