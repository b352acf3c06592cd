// =============
// authority-backend/src/auth/service.rs
// =============
//! The `AuthService` trait: every account and session operation the HTTP
//! layer needs.
use async_trait::async_trait;
use authority_common::{
    Account, AccountId, AccountQuery, AdminUpdateRequest, SignupRequest, UpdateProfileRequest,
};

use super::session::{AuthState, Principal};
use super::token::{SessionClaims, SignedToken};
use crate::error::AppError;

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an account. The first account ever created is the administrator.
    async fn register(&self, request: &SignupRequest) -> Result<Account, AppError>;

    /// Exchange credentials for a token; identifier is username, email or phone
    async fn login(&self, identifier: &str, secret: &str) -> Result<SignedToken, AppError>;

    /// Verify a token and re-check the account it names
    async fn authorize(&self, token: &str) -> Result<Principal, AppError>;

    /// `authorize`, restricted to administrators
    async fn authorize_admin(&self, token: &str) -> Result<Principal, AppError>;

    /// Classify a request by the token it presented, if any
    async fn resolve(&self, presented: Option<&str>) -> AuthState;

    async fn refresh(&self, token: &str) -> Result<SignedToken, AppError>;

    /// Verify a token's signature and expiry only
    fn verify_token(&self, token: &str) -> Result<SessionClaims, AppError>;

    fn logout(&self, presented: Option<&str>);

    /// Lifetime of issued tokens in seconds
    fn token_ttl_secs(&self) -> u64;

    async fn change_password(
        &self,
        account_id: AccountId,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<(), AppError>;

    async fn update_profile(
        &self,
        account_id: AccountId,
        update: &UpdateProfileRequest,
    ) -> Result<Account, AppError>;

    /// Start password recovery; returns the reset token
    async fn request_password_reset(&self, username: &str) -> Result<String, AppError>;

    async fn reset_password(&self, reset_token: &str, new_secret: &str) -> Result<(), AppError>;

    async fn get_account(&self, account_id: AccountId) -> Result<Account, AppError>;

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>, AppError>;

    async fn delete_account(&self, account_id: AccountId) -> Result<Account, AppError>;

    async fn delete_account_by_username(&self, username: &str) -> Result<Account, AppError>;

    /// Administrator edit of any column except the secret
    async fn update_account(
        &self,
        account_id: AccountId,
        update: &AdminUpdateRequest,
    ) -> Result<Account, AppError>;

    /// Flip the disabled flag; returns the updated account
    async fn toggle_disabled(&self, username: &str) -> Result<Account, AppError>;
}
