// ================
// common/src/lib.rs
// ================
//! Account records and the JSON request/response bodies exchanged
//! between clients and the account service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Primary key of an account row
pub type AccountId = i64;

/// Persisted account row
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    /// Unique login name
    pub username: String,
    /// Unique email address, if given
    pub email: Option<String>,
    /// Unique phone number, if given
    pub phonenumber: Option<String>,
    pub full_name: Option<String>,
    /// PHC-formatted scrypt digest
    pub secret_hash: String,
    pub disabled: bool,
    pub is_admin: bool,
    /// Outstanding password-reset token, cleared once redeemed
    #[serde(default)]
    pub reset_token: Option<String>,
    #[serde(default)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phonenumber", &self.phonenumber)
            .field("disabled", &self.disabled)
            .field("is_admin", &self.is_admin)
            .field("reset_pending", &self.reset_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Fields needed to insert a new account; the store assigns `id` and `created_at`
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub phonenumber: Option<String>,
    pub full_name: Option<String>,
    pub secret_hash: String,
    pub role: InitialRole,
}

/// How the admin flag of a new account is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialRole {
    #[default]
    User,
    Admin,
    /// Administrator only if the table is empty when the row is inserted
    AdminIfFirst,
}

/// Public view of an account; never carries the digest or reset token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub id: AccountId,
    pub username: String,
    pub email: Option<String>,
    pub phonenumber: Option<String>,
    pub full_name: Option<String>,
    pub disabled: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            phonenumber: account.phonenumber.clone(),
            full_name: account.full_name.clone(),
            disabled: account.disabled,
            is_admin: account.is_admin,
            created_at: account.created_at,
        }
    }
}

/// Body of `POST /auth/signup`
#[derive(Deserialize, Serialize, Clone)]
pub struct SignupRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub password: String,
}

/// Body of `POST /auth/login`. `username` may also be an email or phone number.
#[derive(Deserialize, Serialize, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued bearer credential
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
        }
    }
}

/// Body of `POST /auth/verify-token`
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Body of `POST /auth/forgot-password`
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ForgotPasswordRequest {
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetTokenResponse {
    pub reset_token: String,
}

/// Body of `POST /auth/reset-password`
#[derive(Deserialize, Serialize, Clone)]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
}

/// Body of `POST /auth/change-password`
#[derive(Deserialize, Serialize, Clone)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Body of `POST /auth/update-profile`; absent fields are left unchanged
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Body of `PATCH /admin/users/{id}`; absent fields are left unchanged and
/// an empty string clears an optional field
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct AdminUpdateRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Query string of `GET /admin/users`
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct AccountQuery {
    /// Case-insensitive substring of username, email or phone number
    pub query: Option<String>,
    pub is_admin: Option<bool>,
    pub disabled: Option<bool>,
}

impl AccountQuery {
    /// Whether `account` passes every filter that is set
    pub fn matches(&self, account: &Account) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let needle = query.to_lowercase();
            let hit = |field: Option<&str>| {
                field.is_some_and(|value| value.to_lowercase().contains(&needle))
            };
            if !(hit(Some(&account.username))
                || hit(account.email.as_deref())
                || hit(account.phonenumber.as_deref()))
            {
                return false;
            }
        }
        if self.is_admin.is_some_and(|flag| flag != account.is_admin) {
            return false;
        }
        if self.disabled.is_some_and(|flag| flag != account.disabled) {
            return false;
        }
        true
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToggleActiveResponse {
    pub username: String,
    pub disabled: bool,
    pub detail: String,
}

/// Generic `{"detail": ...}` acknowledgement
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

impl Drop for SignupRequest {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl Drop for LoginRequest {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl Drop for ResetPasswordRequest {
    fn drop(&mut self) {
        self.new_password.zeroize();
    }
}

impl Drop for ChangePasswordRequest {
    fn drop(&mut self) {
        self.old_password.zeroize();
        self.new_password.zeroize();
    }
}
