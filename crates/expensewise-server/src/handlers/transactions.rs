//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use expensewise_core::db::TransactionFilter;
use expensewise_core::filters::parse_date;
use expensewise_core::models::{Category, Transaction, TransactionType};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub account: Option<String>,
    pub group: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    /// Ranked full-text search instead of date order
    pub q: Option<String>,
    /// Custom start date (YYYY-MM-DD)
    pub from: Option<String>,
    /// Custom end date (YYYY-MM-DD)
    pub to: Option<String>,
    /// Sort direction (asc or desc)
    pub order: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/transactions - List or search transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<TransactionResponse>, AppError> {
    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let category = params
        .category
        .as_deref()
        .map(|c| c.parse::<Category>())
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;
    let tx_type = params
        .tx_type
        .as_deref()
        .map(|t| t.parse::<TransactionType>())
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    let date_range = match (&params.from, &params.to) {
        (Some(from), Some(to)) => {
            let from = parse_date(from).map_err(AppError::from_core)?;
            let to = parse_date(to).map_err(AppError::from_core)?;
            if from > to {
                return Err(AppError::bad_request("'from' must not be after 'to'"));
            }
            Some((from, to))
        }
        (None, None) => None,
        _ => return Err(AppError::bad_request("'from' and 'to' must be given together")),
    };

    let filter = TransactionFilter::new()
        .account_id(params.account.as_deref())
        .group_id(params.group.as_deref())
        .category(category)
        .tx_type(tx_type)
        .date_range(date_range)
        .ascending(params.order.as_deref() == Some("asc"));

    if let Some(query) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let data = state.dataset().await?;
        let matches: Vec<&Transaction> = data
            .search(query)
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect();
        let total = matches.len() as i64;
        let transactions = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        return Ok(Json(TransactionResponse {
            transactions,
            total,
            limit,
            offset,
        }));
    }

    let transactions = state.db.list_transactions(&filter, limit, offset)?;
    let total = state.db.count_transactions(&filter)?;

    Ok(Json(TransactionResponse {
        transactions,
        total,
        limit,
        offset,
    }))
}
