// ============================
// authority-backend/src/auth/reset.rs
// ============================
//! Single-use password-reset tokens.
//!
//! At most one token is outstanding per account; issuing a new one
//! replaces the old. Redemption clears the token, so it works once.
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use metrics::counter;
use rand::{rngs::OsRng, RngCore};

use super::clock::Clock;
use super::password::SecretHasher;
use crate::error::AppError;
use crate::metrics::{RESET_ISSUED, RESET_REDEEMED};
use crate::storage::{AccountStore, ResetRedemption};

/// Default reset-token lifetime in seconds (one hour)
pub const RESET_TOKEN_TTL_SECS: u64 = 60 * 60;

/// Random bytes behind each token
const RESET_TOKEN_BYTES: usize = 32;

/// URL-safe base64 of 32 bytes from the OS RNG
fn new_reset_token() -> String {
    let mut buffer = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

pub struct ResetTokenStore {
    store: Arc<dyn AccountStore>,
    hasher: SecretHasher,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ResetTokenStore {
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: SecretHasher,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
            ttl,
        }
    }

    /// Generate a fresh token for `username`, replacing any outstanding one
    pub async fn issue(&self, username: &str) -> Result<String, AppError> {
        let account = self
            .store
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let token = new_reset_token();
        self.store
            .set_reset_token(account.id, token.clone(), self.clock.now() + self.ttl)
            .await?;

        counter!(RESET_ISSUED).increment(1);
        tracing::info!(account_id = account.id, "reset token issued");
        Ok(token)
    }

    /// Set a new secret for the account holding `token` and clear the token.
    /// Of several concurrent redemptions of one token, exactly one succeeds.
    pub async fn redeem(&self, token: &str, new_secret: &str) -> Result<(), AppError> {
        if token.is_empty() {
            return Err(AppError::InvalidResetToken);
        }
        // skip the hash for tokens nobody holds
        if self.store.find_by_reset_token(token).await?.is_none() {
            return Err(AppError::InvalidResetToken);
        }

        let secret_hash = self.hasher.hash_blocking(new_secret).await?;
        match self
            .store
            .redeem_reset_token(token, secret_hash, self.clock.now())
            .await?
        {
            ResetRedemption::Redeemed(account) => {
                counter!(RESET_REDEEMED).increment(1);
                tracing::info!(account_id = account.id, "password reset");
                Ok(())
            }
            ResetRedemption::Expired(account_id) => {
                tracing::warn!(account_id, "expired reset token presented");
                Err(AppError::InvalidResetToken)
            }
            ResetRedemption::Unknown => Err(AppError::InvalidResetToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::password::verify_password;
    use crate::storage::MemoryAccountStore;
    use authority_common::{InitialRole, NewAccount};

    struct Fixture {
        clock: Arc<ManualClock>,
        store: MemoryAccountStore,
        resets: ResetTokenStore,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryAccountStore::new();
        let hasher = SecretHasher::new(4).unwrap();
        store
            .create(NewAccount {
                username: "alice".to_string(),
                email: None,
                phonenumber: None,
                full_name: None,
                secret_hash: hasher.hash("oldpass").unwrap(),
                role: InitialRole::User,
            })
            .await
            .unwrap();
        let resets = ResetTokenStore::new(
            Arc::new(store.clone()),
            hasher,
            clock.clone(),
            Duration::seconds(RESET_TOKEN_TTL_SECS as i64),
        );
        Fixture { clock, store, resets }
    }

    async fn hash_of(store: &MemoryAccountStore) -> String {
        store.find_by_username("alice").await.unwrap().unwrap().secret_hash
    }

    #[tokio::test]
    async fn test_redeem_succeeds_once() {
        let fx = fixture().await;
        let token = fx.resets.issue("alice").await.unwrap();

        fx.resets.redeem(&token, "newpass").await.unwrap();
        assert!(verify_password(&hash_of(&fx.store).await, "newpass"));

        assert!(matches!(
            fx.resets.redeem(&token, "again").await,
            Err(AppError::InvalidResetToken)
        ));
        assert!(verify_password(&hash_of(&fx.store).await, "newpass"));
    }

    #[tokio::test]
    async fn test_new_token_supersedes_old() {
        let fx = fixture().await;
        let first = fx.resets.issue("alice").await.unwrap();
        let second = fx.resets.issue("alice").await.unwrap();
        assert_ne!(first, second);

        assert!(matches!(
            fx.resets.redeem(&first, "newpass").await,
            Err(AppError::InvalidResetToken)
        ));
        fx.resets.redeem(&second, "newpass").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_user_and_token() {
        let fx = fixture().await;
        assert!(matches!(fx.resets.issue("nobody").await, Err(AppError::NotFound(_))));
        assert!(matches!(
            fx.resets.redeem("never-issued", "newpass").await,
            Err(AppError::InvalidResetToken)
        ));
        assert!(matches!(fx.resets.redeem("", "newpass").await, Err(AppError::InvalidResetToken)));
    }

    #[tokio::test]
    async fn test_expired_token_is_cleared() {
        let fx = fixture().await;
        let token = fx.resets.issue("alice").await.unwrap();

        fx.clock.advance(Duration::seconds(RESET_TOKEN_TTL_SECS as i64 + 1));
        assert!(matches!(
            fx.resets.redeem(&token, "newpass").await,
            Err(AppError::InvalidResetToken)
        ));
        let account = fx.store.find_by_username("alice").await.unwrap().unwrap();
        assert!(account.reset_token.is_none());
        assert!(verify_password(&account.secret_hash, "oldpass"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeems_succeed_once() {
        let fx = fixture().await;
        let token = fx.resets.issue("alice").await.unwrap();

        let (first, second) = tokio::join!(
            fx.resets.redeem(&token, "first-pass"),
            fx.resets.redeem(&token, "second-pass"),
        );
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);

        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser, Err(AppError::InvalidResetToken)));

        let stored = hash_of(&fx.store).await;
        assert!(verify_password(&stored, "first-pass") || verify_password(&stored, "second-pass"));
        assert!(fx.store.find_by_username("alice").await.unwrap().unwrap().reset_token.is_none());
    }

    #[test]
    fn test_token_shape() {
        let first = new_reset_token();
        let second = new_reset_token();
        assert_ne!(first, second);
        // 32 bytes without padding
        assert_eq!(first.len(), 43);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
