// ============================
// authority-backend/src/auth/session.rs
// ============================
//! Login, authorization and refresh over stateless bearer tokens.
//!
//! Nothing is stored per session: a token is valid while its signature
//! checks out, it has not expired, and the account it names still exists
//! and is enabled. The account is re-read on every authorization.
use std::sync::Arc;

use authority_common::{Account, AccountId};
use chrono::Duration;
use metrics::counter;

use super::password::SecretHasher;
use super::token::{Identity, SessionClaims, SignedToken, TokenCodec};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED, TOKEN_ISSUED, TOKEN_REJECTED};
use crate::storage::AccountStore;

/// Default session lifetime in seconds (30 minutes)
pub const SESSION_TTL_SECS: u64 = 30 * 60;

/// Verified caller: the token's claims and the current account row
#[derive(Debug, Clone)]
pub struct Principal {
    pub claims: SessionClaims,
    pub account: Account,
}

/// Authorization status of a single request
#[derive(Debug)]
pub enum AuthState {
    /// No token presented
    Anonymous,
    Authenticated(Principal),
    /// Token presented but not accepted; terminal for the request
    Rejected(AppError),
}

/// Strip an optional `Bearer ` prefix (any case) and surrounding whitespace
pub fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
            let rest = &raw[6..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim_start()
            } else {
                raw
            }
        },
        _ => raw,
    }
}

pub struct SessionAuthority {
    store: Arc<dyn AccountStore>,
    codec: TokenCodec,
    hasher: SecretHasher,
    token_ttl: Duration,
    /// Verified against on unknown identifiers so both failure paths cost the same
    decoy_hash: String,
}

impl SessionAuthority {
    pub fn new(
        store: Arc<dyn AccountStore>,
        codec: TokenCodec,
        hasher: SecretHasher,
        token_ttl: Duration,
    ) -> Result<Self, AppError> {
        let decoy_hash = hasher.hash("decoy-secret-for-unknown-accounts")?;
        Ok(Self {
            store,
            codec,
            hasher,
            token_ttl,
            decoy_hash,
        })
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Resolve `identifier` as username, then email, then phone number
    async fn lookup(&self, identifier: &str) -> Result<Option<Account>, AppError> {
        if let Some(account) = self.store.find_by_username(identifier).await? {
            return Ok(Some(account));
        }
        if let Some(account) = self.store.find_by_email(identifier).await? {
            return Ok(Some(account));
        }
        Ok(self.store.find_by_phonenumber(identifier).await?)
    }

    /// Check credentials and mint a token.
    ///
    /// Unknown identifier and wrong secret both end in `BadCredentials`.
    /// Disabled accounts still receive a token here; `authorize` refuses it.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<SignedToken, AppError> {
        let account = self.lookup(identifier).await?;
        let (hash, account) = match account {
            Some(account) => (account.secret_hash.clone(), Some(account)),
            None => (self.decoy_hash.clone(), None),
        };
        let verified = self.hasher.verify_blocking(&hash, secret).await?;

        match account {
            Some(account) if verified => {
                counter!(LOGIN_SUCCEEDED).increment(1);
                tracing::info!(account_id = account.id, "login succeeded");
                self.issue(&account)
            },
            _ => {
                counter!(LOGIN_FAILED).increment(1);
                tracing::warn!("login rejected");
                Err(AppError::BadCredentials)
            },
        }
    }

    /// Mint a token for `account` with the configured lifetime
    pub fn issue(&self, account: &Account) -> Result<SignedToken, AppError> {
        let identity = Identity {
            subject: account.id.to_string(),
            is_admin: account.is_admin,
        };
        self.sign(&identity)
    }

    fn sign(&self, identity: &Identity) -> Result<SignedToken, AppError> {
        let signed = self.codec.sign(identity, self.token_ttl)?;
        counter!(TOKEN_ISSUED).increment(1);
        Ok(signed)
    }

    /// Signature and expiry only; no account lookup
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        self.codec.verify(strip_bearer(token)).map_err(|e| {
            counter!(TOKEN_REJECTED).increment(1);
            tracing::warn!(reason = %e, "token rejected");
            AppError::from(e)
        })
    }

    /// Verify `token` and re-resolve its subject against the account store
    pub async fn authorize(&self, token: &str) -> Result<Principal, AppError> {
        let claims = self.verify(token)?;
        let id: AccountId = claims.sub.parse().map_err(|_| AppError::MalformedToken)?;

        let account = self.store.get(id).await?.ok_or_else(|| {
            tracing::warn!(account_id = id, "token for missing account");
            AppError::InvalidToken
        })?;
        if account.disabled {
            tracing::warn!(account_id = id, "token for disabled account");
            return Err(AppError::AccountDisabled);
        }
        Ok(Principal { claims, account })
    }

    /// `authorize`, then require admin in both the token and the current account
    pub async fn authorize_admin(&self, token: &str) -> Result<Principal, AppError> {
        let principal = self.authorize(token).await?;
        if !(principal.claims.is_admin && principal.account.is_admin) {
            tracing::warn!(account_id = principal.account.id, "admin access refused");
            return Err(AppError::Forbidden("Not admin".to_string()));
        }
        Ok(principal)
    }

    /// Re-mint a currently valid token with the same claims and a new expiry
    pub async fn refresh(&self, token: &str) -> Result<SignedToken, AppError> {
        let principal = self.authorize(token).await?;
        let signed = self.sign(&principal.claims.identity())?;
        tracing::debug!(account_id = principal.account.id, "token refreshed");
        Ok(signed)
    }

    /// Tokens are stateless; logging out only means the client drops its copy.
    /// A still-valid token keeps working until it expires.
    pub fn logout(&self, presented: Option<&str>) {
        if let Some(claims) = presented.and_then(|t| self.codec.verify(strip_bearer(t)).ok()) {
            tracing::info!(subject = %claims.sub, "logout");
        }
    }

    /// Classify a request by the token it presented
    pub async fn resolve(&self, presented: Option<&str>) -> AuthState {
        match presented.map(strip_bearer).filter(|t| !t.is_empty()) {
            None => AuthState::Anonymous,
            Some(token) => match self.authorize(token).await {
                Ok(principal) => AuthState::Authenticated(principal),
                Err(err) => AuthState::Rejected(err),
            },
        }
    }
}
