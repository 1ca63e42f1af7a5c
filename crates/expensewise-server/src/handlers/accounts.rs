//! Account, budget and group listings

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{AppError, AppState};
use expensewise_core::models::{Account, Budget, Group};

/// GET /api/accounts - List all accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(state.db.list_accounts()?))
}

/// GET /api/budgets - List all budgets
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Budget>>, AppError> {
    Ok(Json(state.db.list_budgets()?))
}

/// GET /api/groups - List all groups
pub async fn list_groups(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Group>>, AppError> {
    Ok(Json(state.db.list_groups()?))
}
