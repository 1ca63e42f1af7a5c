//! Import, clear and status handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppError, AppState, SuccessResponse};
use expensewise_core::import::parse_export;
use expensewise_core::models::{ImportMetadata, ImportStats};

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub stats: ImportStats,
    /// Non-fatal issues found while parsing
    pub warnings: Vec<String>,
}

/// POST /api/import - Replace all data with a mobile app export
pub async fn import_data(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ImportResponse>, AppError> {
    if body.is_empty() {
        return Err(AppError::bad_request("Empty request body"));
    }

    let bundle = parse_export(&body).map_err(|e| {
        warn!(error = %e, "Rejected import");
        AppError::from_core(e)
    })?;

    let stats = state.db.replace_all(&bundle)?;
    state.invalidate_dataset().await;

    info!(
        transactions = stats.transactions,
        warnings = bundle.warnings.len(),
        "Import complete"
    );

    Ok(Json(ImportResponse {
        stats,
        warnings: bundle.warnings,
    }))
}

/// DELETE /api/data - Delete everything
pub async fn clear_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.clear_all()?;
    state.invalidate_dataset().await;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub has_data: bool,
    pub import: Option<ImportMetadata>,
    pub transactions: usize,
    pub accounts: usize,
    pub budgets: usize,
    pub groups: usize,
    pub primary_currency: String,
}

/// GET /api/status - What is stored
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, AppError> {
    let data = state.dataset().await?;
    let dataset = &data.dataset;

    Ok(Json(StatusResponse {
        has_data: !dataset.is_empty(),
        import: state.db.import_metadata()?,
        transactions: dataset.transactions.len(),
        accounts: dataset.accounts.len(),
        budgets: dataset.budgets.len(),
        groups: dataset.groups.len(),
        primary_currency: expensewise_core::currency::primary_currency(&dataset.transactions),
    }))
}
