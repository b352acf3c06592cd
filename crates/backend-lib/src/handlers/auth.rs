// ============================
// authority-backend/src/handlers/auth.rs
// ============================
//! Signup, login, session and password-recovery endpoints.
use std::sync::Arc;

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
    Json,
};
use authority_common::{
    AccountView, ChangePasswordRequest, DetailResponse, ForgotPasswordRequest, LoginRequest,
    ResetPasswordRequest, ResetTokenResponse, SignupRequest, TokenResponse, UpdateProfileRequest,
    VerifyTokenRequest,
};

use crate::auth::{SessionClaims, SignedToken};
use crate::error::AppError;
use crate::middleware::{access_cookie, expired_access_cookie, CurrentAccount, PresentedToken};
use crate::AppState;

/// Token body plus the matching `Set-Cookie` header
fn token_response(state: &AppState, signed: SignedToken) -> Result<Response, AppError> {
    let ttl = state.auth.token_ttl_secs();
    let cookie = access_cookie(&signed.token, ttl, state.settings.auth.cookie_secure)?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(TokenResponse::bearer(signed.token, ttl)),
    )
        .into_response())
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<AccountView>, AppError> {
    let account = state.auth.register(&request).await?;
    Ok(Json(AccountView::from(&account)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let signed = state.auth.login(&request.username, &request.password).await?;
    token_response(&state, signed)
}

/// Always succeeds; clears the cookie whether or not a token was sent
pub async fn logout(
    State(state): State<Arc<AppState>>,
    PresentedToken(token): PresentedToken,
) -> impl IntoResponse {
    state.auth.logout(token.as_deref());
    (
        [(SET_COOKIE, expired_access_cookie(state.settings.auth.cookie_secure))],
        Json(DetailResponse::new("Logout successful. You have been signed out.")),
    )
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    PresentedToken(token): PresentedToken,
) -> Result<Response, AppError> {
    let token = token.ok_or(AppError::Unauthenticated)?;
    let signed = state.auth.refresh(&token).await?;
    token_response(&state, signed)
}

/// Report the claims of a token checked end to end, account included
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyTokenRequest>,
) -> Result<Json<SessionClaims>, AppError> {
    let principal = state.auth.authorize(&request.token).await?;
    Ok(Json(principal.claims))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<ResetTokenResponse>, AppError> {
    let reset_token = state.auth.request_password_reset(&request.username).await?;
    Ok(Json(ResetTokenResponse { reset_token }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    state
        .auth
        .reset_password(&request.reset_token, &request.new_password)
        .await?;
    Ok(Json(DetailResponse::new(
        "Password reset successful. You can now log in with your new password.",
    )))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentAccount(principal): CurrentAccount,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<DetailResponse>, AppError> {
    state
        .auth
        .change_password(principal.account.id, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(DetailResponse::new("Password changed successfully.")))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentAccount(principal): CurrentAccount,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<AccountView>, AppError> {
    let account = state.auth.update_profile(principal.account.id, &request).await?;
    Ok(Json(AccountView::from(&account)))
}
