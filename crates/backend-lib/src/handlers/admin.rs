// ============================
// authority-backend/src/handlers/admin.rs
// ============================
//! Administrator-only account management.
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use authority_common::{
    AccountId, AccountQuery, AccountView, AdminUpdateRequest, DetailResponse, ToggleActiveResponse,
};

use crate::error::AppError;
use crate::middleware::AdminAccount;
use crate::AppState;

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminAccount(_admin): AdminAccount,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<AccountView>>, AppError> {
    let accounts = state.auth.list_accounts(&query).await?;
    Ok(Json(accounts.iter().map(AccountView::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AdminAccount(_admin): AdminAccount,
    Path(account_id): Path<AccountId>,
) -> Result<Json<AccountView>, AppError> {
    let account = state.auth.get_account(account_id).await?;
    Ok(Json(AccountView::from(&account)))
}

/// Edit the named columns of an account; the secret is not editable here
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminAccount(admin): AdminAccount,
    Path(account_id): Path<AccountId>,
    Json(update): Json<AdminUpdateRequest>,
) -> Result<Json<AccountView>, AppError> {
    let account = state.auth.update_account(account_id, &update).await?;
    tracing::info!(admin = %admin.account.username, account = %account.username, "admin updated account");
    Ok(Json(AccountView::from(&account)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminAccount(admin): AdminAccount,
    Path(username): Path<String>,
) -> Result<Json<DetailResponse>, AppError> {
    let removed = state.auth.delete_account_by_username(&username).await?;
    tracing::info!(admin = %admin.account.username, deleted = %removed.username, "admin deleted account");
    Ok(Json(DetailResponse::new(format!(
        "User '{}' has been deleted successfully.",
        removed.username
    ))))
}

/// Enable a disabled account or disable an enabled one
pub async fn toggle_active(
    State(state): State<Arc<AppState>>,
    AdminAccount(admin): AdminAccount,
    Path(username): Path<String>,
) -> Result<Json<ToggleActiveResponse>, AppError> {
    let account = state.auth.toggle_disabled(&username).await?;
    let status = if account.disabled { "locked (inactive)" } else { "unlocked (active)" };
    tracing::info!(admin = %admin.account.username, account = %account.username, disabled = account.disabled, "admin toggled account");
    Ok(Json(ToggleActiveResponse {
        detail: format!("User '{}' has been {status}.", account.username),
        username: account.username,
        disabled: account.disabled,
    }))
}
