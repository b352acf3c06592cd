// ============================
// authority-backend/src/auth/service_impl.rs
// ============================
use std::sync::Arc;

use async_trait::async_trait;
use authority_common::{
    Account, AccountId, AccountQuery, AdminUpdateRequest, InitialRole, NewAccount, SignupRequest,
    UpdateProfileRequest,
};
use chrono::Duration;
use metrics::counter;

use super::clock::Clock;
use super::password::{PasswordRequirements, SecretHasher};
use super::reset::ResetTokenStore;
use super::session::{AuthState, Principal, SessionAuthority};
use super::token::{parse_algorithm, SessionClaims, SignedToken, TokenCodec};
use super::AuthService;
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics::{ACCOUNT_CREATED, ACCOUNT_DELETED};
use crate::storage::{AccountPatch, AccountStore, StoreError};
use crate::validation;

/// `AuthService` over an `AccountStore`
pub struct DefaultAuth {
    store: Arc<dyn AccountStore>,
    sessions: SessionAuthority,
    resets: ResetTokenStore,
    hasher: SecretHasher,
    requirements: PasswordRequirements,
}

impl DefaultAuth {
    pub fn new(
        store: Arc<dyn AccountStore>,
        sessions: SessionAuthority,
        resets: ResetTokenStore,
        hasher: SecretHasher,
        requirements: PasswordRequirements,
    ) -> Self {
        Self {
            store,
            sessions,
            resets,
            hasher,
            requirements,
        }
    }

    /// Wire every component from validated settings
    pub fn from_settings(
        store: Arc<dyn AccountStore>,
        settings: &Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let auth = &settings.auth;
        let algorithm = parse_algorithm(&auth.algorithm)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let codec = TokenCodec::new(auth.secret_key.as_bytes(), algorithm, clock.clone());
        let hasher = SecretHasher::new(auth.scrypt_log_n)?;

        let sessions = SessionAuthority::new(
            store.clone(),
            codec,
            hasher,
            Duration::seconds(auth.token_ttl_secs as i64),
        )?;
        let resets = ResetTokenStore::new(
            store.clone(),
            hasher,
            clock,
            Duration::seconds(auth.reset_token_ttl_secs as i64),
        );

        Ok(Self::new(
            store,
            sessions,
            resets,
            hasher,
            settings.password_requirements.clone(),
        ))
    }

    async fn require(&self, account_id: AccountId) -> Result<Account, AppError> {
        self.store
            .get(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    fn not_found(err: StoreError) -> AppError {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("User not found".to_string()),
            other => other.into(),
        }
    }

    async fn require_username(&self, username: &str) -> Result<Account, AppError> {
        self.store
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// Treat empty strings from clients as absent
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `Some` only for fields the client sent; an empty string clears the column
fn clearable(value: &Option<String>) -> Option<Option<String>> {
    value.as_ref().map(|_| non_empty(value))
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn register(&self, request: &SignupRequest) -> Result<Account, AppError> {
        validation::validate_signup(request, &self.requirements)?;

        let secret_hash = self.hasher.hash_blocking(&request.password).await?;
        let account = self
            .store
            .create(NewAccount {
                username: request.username.clone(),
                email: non_empty(&request.email),
                phonenumber: non_empty(&request.phonenumber),
                full_name: non_empty(&request.full_name),
                secret_hash,
                role: InitialRole::AdminIfFirst,
            })
            .await?;

        counter!(ACCOUNT_CREATED).increment(1);
        tracing::info!(account_id = account.id, is_admin = account.is_admin, "account created");
        Ok(account)
    }

    async fn login(&self, identifier: &str, secret: &str) -> Result<SignedToken, AppError> {
        self.sessions.login(identifier.trim(), secret).await
    }

    async fn authorize(&self, token: &str) -> Result<Principal, AppError> {
        self.sessions.authorize(token).await
    }

    async fn authorize_admin(&self, token: &str) -> Result<Principal, AppError> {
        self.sessions.authorize_admin(token).await
    }

    async fn resolve(&self, presented: Option<&str>) -> AuthState {
        self.sessions.resolve(presented).await
    }

    async fn refresh(&self, token: &str) -> Result<SignedToken, AppError> {
        self.sessions.refresh(token).await
    }

    fn verify_token(&self, token: &str) -> Result<SessionClaims, AppError> {
        self.sessions.verify(token)
    }

    fn logout(&self, presented: Option<&str>) {
        self.sessions.logout(presented);
    }

    fn token_ttl_secs(&self) -> u64 {
        self.sessions.token_ttl().num_seconds().max(0) as u64
    }

    async fn change_password(
        &self,
        account_id: AccountId,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<(), AppError> {
        let account = self.require(account_id).await?;
        if !self.hasher.verify_blocking(&account.secret_hash, old_secret).await? {
            return Err(AppError::InvalidInput(
                "Old password is incorrect. Please try again.".to_string(),
            ));
        }
        validation::validate_password(new_secret, &self.requirements)?;

        let secret_hash = self.hasher.hash_blocking(new_secret).await?;
        self.store
            .set_secret_hash(account_id, secret_hash)
            .await
            .map_err(Self::not_found)?;
        tracing::info!(account_id, "password changed");
        Ok(())
    }

    async fn update_profile(
        &self,
        account_id: AccountId,
        update: &UpdateProfileRequest,
    ) -> Result<Account, AppError> {
        validation::validate_profile_update(update)?;
        let patch = AccountPatch {
            email: clearable(&update.email),
            phonenumber: clearable(&update.phonenumber),
            full_name: clearable(&update.full_name),
            ..Default::default()
        };
        let account = self
            .store
            .update_fields(account_id, &patch)
            .await
            .map_err(Self::not_found)?;
        tracing::info!(account_id, "profile updated");
        Ok(account)
    }

    async fn request_password_reset(&self, username: &str) -> Result<String, AppError> {
        self.resets.issue(username.trim()).await
    }

    async fn reset_password(&self, reset_token: &str, new_secret: &str) -> Result<(), AppError> {
        validation::validate_password(new_secret, &self.requirements)?;
        self.resets.redeem(reset_token.trim(), new_secret).await
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Account, AppError> {
        self.require(account_id).await
    }

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>, AppError> {
        let accounts = self.store.list().await?;
        Ok(accounts.into_iter().filter(|a| query.matches(a)).collect())
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<Account, AppError> {
        let removed = self.store.delete(account_id).await.map_err(Self::not_found)?;
        counter!(ACCOUNT_DELETED).increment(1);
        tracing::info!(account_id, username = %removed.username, "account deleted");
        Ok(removed)
    }

    async fn delete_account_by_username(&self, username: &str) -> Result<Account, AppError> {
        let account = self.require_username(username).await?;
        self.delete_account(account.id).await
    }

    async fn update_account(
        &self,
        account_id: AccountId,
        update: &AdminUpdateRequest,
    ) -> Result<Account, AppError> {
        validation::validate_admin_update(update)?;
        let patch = AccountPatch {
            username: update.username.as_deref().map(|u| u.trim().to_string()),
            email: clearable(&update.email),
            phonenumber: clearable(&update.phonenumber),
            full_name: clearable(&update.full_name),
            disabled: update.disabled,
            is_admin: update.is_admin,
        };
        let account = self
            .store
            .update_fields(account_id, &patch)
            .await
            .map_err(Self::not_found)?;
        tracing::info!(account_id, "account updated by administrator");
        Ok(account)
    }

    async fn toggle_disabled(&self, username: &str) -> Result<Account, AppError> {
        let account = self.require_username(username).await?;
        let account = self
            .store
            .toggle_disabled(account.id)
            .await
            .map_err(Self::not_found)?;
        tracing::info!(account_id = account.id, disabled = account.disabled, "account status toggled");
        Ok(account)
    }
}
