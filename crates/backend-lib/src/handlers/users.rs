// ============================
// authority-backend/src/handlers/users.rs
// ============================
use std::sync::Arc;

use axum::{extract::State, http::header::SET_COOKIE, response::IntoResponse, Json};
use authority_common::{AccountView, DetailResponse};

use crate::error::AppError;
use crate::middleware::{expired_access_cookie, CurrentAccount};
use crate::AppState;

/// Profile of the caller
pub async fn me(CurrentAccount(principal): CurrentAccount) -> Json<AccountView> {
    Json(AccountView::from(&principal.account))
}

/// Delete the caller's own account and clear its cookie
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    CurrentAccount(principal): CurrentAccount,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.auth.delete_account(principal.account.id).await?;
    Ok((
        [(SET_COOKIE, expired_access_cookie(state.settings.auth.cookie_secure))],
        Json(DetailResponse::new(format!(
            "User '{}' has been deleted successfully.",
            removed.username
        ))),
    ))
}
