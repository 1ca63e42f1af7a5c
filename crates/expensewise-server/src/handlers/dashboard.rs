//! Dashboard and exchange-rate handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::{AppError, AppState};
use expensewise_core::filters::DashboardFilters;
use expensewise_core::stats::DashboardStats;

/// GET /api/dashboard?range=&from=&to=&currency=&account=&category=&group=
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DashboardStats>, AppError> {
    let filters = DashboardFilters::from_query_pairs(params).map_err(AppError::from_core)?;
    debug!(?filters, "Dashboard request");

    let data = state.dataset().await?;
    let today = Local::now().date_naive();
    let stats = DashboardStats::for_dataset(&data.dataset, &filters, Some(&state.rates), today);

    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct CurrenciesResponse {
    pub base: String,
    pub date: Option<String>,
    pub currencies: Vec<String>,
    pub rates: std::collections::BTreeMap<String, f64>,
}

/// GET /api/currencies - Exchange-rate snapshot
pub async fn get_currencies(State(state): State<Arc<AppState>>) -> Json<CurrenciesResponse> {
    Json(CurrenciesResponse {
        base: state.rates.base.clone(),
        date: state.rates.date.clone(),
        currencies: state.rates.currencies(),
        rates: state.rates.rates.clone(),
    })
}
