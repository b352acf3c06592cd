// ============================
// authority-backend/src/storage.rs
// ============================
//! Account storage abstraction with in-memory and flat-file implementations.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use authority_common::{Account, AccountId, InitialRole, NewAccount};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{fs as tokio_fs, sync::Mutex};

/// Errors raised by account stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("account {0} not found")]
    NotFound(AccountId),

    /// A unique column (`username`, `email` or `phonenumber`) is already taken
    #[error("{0} already registered")]
    Conflict(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Column-level change to one row. `None` leaves a column as it is;
/// `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub email: Option<Option<String>>,
    pub phonenumber: Option<Option<String>>,
    pub full_name: Option<Option<String>>,
    pub disabled: Option<bool>,
    pub is_admin: Option<bool>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply_to(&self, account: &mut Account) {
        if let Some(username) = &self.username {
            account.username = username.clone();
        }
        if let Some(email) = &self.email {
            account.email = email.clone();
        }
        if let Some(phonenumber) = &self.phonenumber {
            account.phonenumber = phonenumber.clone();
        }
        if let Some(full_name) = &self.full_name {
            account.full_name = full_name.clone();
        }
        if let Some(disabled) = self.disabled {
            account.disabled = disabled;
        }
        if let Some(is_admin) = self.is_admin {
            account.is_admin = is_admin;
        }
    }
}

/// Outcome of [`AccountStore::redeem_reset_token`]
#[derive(Debug)]
pub enum ResetRedemption {
    /// The token was live; the new secret is stored and the token is gone
    Redeemed(Account),
    /// The token had expired; it is cleared and the secret is unchanged
    Expired(AccountId),
    /// No row holds the token
    Unknown,
}

/// Persistence collaborator for the `Account` entity.
///
/// Every mutation is a single-row read-modify-write performed under the
/// store's own lock, so concurrent callers never overwrite each other's
/// columns. No transactions span calls.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_phonenumber(&self, phonenumber: &str)
        -> Result<Option<Account>, StoreError>;

    /// Exact-match lookup on the outstanding reset token
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Account>, StoreError>;

    async fn list(&self) -> Result<Vec<Account>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Insert a new row, assigning `id` and `created_at`
    async fn create(&self, new: NewAccount) -> Result<Account, StoreError>;

    /// Apply `patch` to the row, keeping the unique columns unique
    async fn update_fields(&self, id: AccountId, patch: &AccountPatch)
        -> Result<Account, StoreError>;

    /// Flip the `disabled` flag
    async fn toggle_disabled(&self, id: AccountId) -> Result<Account, StoreError>;

    async fn set_secret_hash(&self, id: AccountId, secret_hash: String)
        -> Result<Account, StoreError>;

    /// Store a reset token, replacing any outstanding one
    async fn set_reset_token(
        &self,
        id: AccountId,
        token: String,
        expires_at: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    /// Consume `token` in one step: whichever caller gets here first clears
    /// it, and only a live token has `secret_hash` written alongside.
    async fn redeem_reset_token(
        &self,
        token: &str,
        secret_hash: String,
        now: DateTime<Utc>,
    ) -> Result<ResetRedemption, StoreError>;

    async fn delete(&self, id: AccountId) -> Result<Account, StoreError>;
}

#[derive(Default, Clone)]
struct Rows {
    next_id: AccountId,
    accounts: BTreeMap<AccountId, Account>,
}

impl Rows {
    fn from_table(table: Table) -> Self {
        let highest = table.accounts.iter().map(|a| a.id).max().unwrap_or(0);
        Self {
            next_id: table.next_id.max(highest),
            accounts: table.accounts.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    fn to_table(&self) -> Table {
        Table {
            next_id: self.next_id,
            accounts: self.accounts.values().cloned().collect(),
        }
    }

    fn find(&self, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts.values().find(|a| pred(a)).cloned()
    }

    /// Fails if a row other than `id` already holds one of the unique values
    fn check_unique(
        &self,
        id: Option<AccountId>,
        username: &str,
        email: Option<&str>,
        phonenumber: Option<&str>,
    ) -> Result<(), StoreError> {
        for other in self.accounts.values().filter(|a| Some(a.id) != id) {
            if other.username == username {
                return Err(StoreError::Conflict("username"));
            }
            if email.is_some() && other.email.as_deref() == email {
                return Err(StoreError::Conflict("email"));
            }
            if phonenumber.is_some() && other.phonenumber.as_deref() == phonenumber {
                return Err(StoreError::Conflict("phonenumber"));
            }
        }
        Ok(())
    }

    fn insert(&mut self, new: NewAccount) -> Result<Account, StoreError> {
        self.check_unique(
            None,
            &new.username,
            new.email.as_deref(),
            new.phonenumber.as_deref(),
        )?;
        let is_admin = match new.role {
            InitialRole::User => false,
            InitialRole::Admin => true,
            InitialRole::AdminIfFirst => self.accounts.is_empty(),
        };
        self.next_id += 1;
        let account = Account {
            id: self.next_id,
            username: new.username,
            email: new.email,
            phonenumber: new.phonenumber,
            full_name: new.full_name,
            secret_hash: new.secret_hash,
            disabled: false,
            is_admin,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn modify(
        &mut self,
        id: AccountId,
        change: impl FnOnce(&mut Account),
    ) -> Result<Account, StoreError> {
        let account = self.accounts.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        change(account);
        Ok(account.clone())
    }

    fn patch(&mut self, id: AccountId, patch: &AccountPatch) -> Result<Account, StoreError> {
        let mut account = self.accounts.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        patch.apply_to(&mut account);
        self.check_unique(
            Some(id),
            &account.username,
            account.email.as_deref(),
            account.phonenumber.as_deref(),
        )?;
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn redeem(&mut self, token: &str, secret_hash: String, now: DateTime<Utc>) -> ResetRedemption {
        let Some(account) = self
            .accounts
            .values_mut()
            .find(|a| a.reset_token.as_deref() == Some(token))
        else {
            return ResetRedemption::Unknown;
        };

        let expired = account.reset_token_expires_at.is_some_and(|deadline| now > deadline);
        account.reset_token = None;
        account.reset_token_expires_at = None;
        if expired {
            return ResetRedemption::Expired(account.id);
        }
        account.secret_hash = secret_hash;
        ResetRedemption::Redeemed(account.clone())
    }

    fn remove(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.accounts.remove(&id).ok_or(StoreError::NotFound(id))
    }
}

/// Process-local account store
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    rows: Arc<RwLock<Rows>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_table(table: Table) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Rows::from_table(table))),
        }
    }

    fn snapshot(&self) -> Vec<Account> {
        self.rows.read().accounts.values().cloned().collect()
    }
}

/// On-disk layout of `accounts.json`. `next_id` is kept so ids of deleted
/// rows are never handed out again.
#[derive(Serialize, Deserialize, Default)]
struct Table {
    next_id: AccountId,
    accounts: Vec<Account>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.rows.read().accounts.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.rows.read().find(|a| a.username == username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.rows.read().find(|a| a.email.as_deref() == Some(email)))
    }

    async fn find_by_phonenumber(
        &self,
        phonenumber: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self.rows.read().find(|a| a.phonenumber.as_deref() == Some(phonenumber)))
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.rows.read().find(|a| a.reset_token.as_deref() == Some(token)))
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.snapshot())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.rows.read().accounts.len())
    }

    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.rows.write().insert(new)
    }

    async fn update_fields(
        &self,
        id: AccountId,
        patch: &AccountPatch,
    ) -> Result<Account, StoreError> {
        self.rows.write().patch(id, patch)
    }

    async fn toggle_disabled(&self, id: AccountId) -> Result<Account, StoreError> {
        self.rows.write().modify(id, |a| a.disabled = !a.disabled)
    }

    async fn set_secret_hash(
        &self,
        id: AccountId,
        secret_hash: String,
    ) -> Result<Account, StoreError> {
        self.rows.write().modify(id, |a| a.secret_hash = secret_hash)
    }

    async fn set_reset_token(
        &self,
        id: AccountId,
        token: String,
        expires_at: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        self.rows.write().modify(id, |a| {
            a.reset_token = Some(token);
            a.reset_token_expires_at = Some(expires_at);
        })
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        secret_hash: String,
        now: DateTime<Utc>,
    ) -> Result<ResetRedemption, StoreError> {
        Ok(self.rows.write().redeem(token, secret_hash, now))
    }

    async fn delete(&self, id: AccountId) -> Result<Account, StoreError> {
        self.rows.write().remove(id)
    }
}

/// Flat-file implementation: the whole table lives in `accounts.json` under
/// the data directory and is rewritten after every mutation.
#[derive(Clone)]
pub struct FlatFileAccountStore {
    path: PathBuf,
    memory: MemoryAccountStore,
    /// Serializes stage-persist-swap sequences
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileAccountStore {
    /// Open (or create) the store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let path = root.join("accounts.json");

        let table: Table = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Table::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Table::default()
        };
        tracing::debug!(path = %path.display(), accounts = table.accounts.len(), "opened account store");

        Ok(Self {
            path,
            memory: MemoryAccountStore::from_table(table),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Write `table` to a temp file and move it over `accounts.json`
    async fn persist(&self, table: &Table) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `change` to a copy of the rows, write the copy to disk and only
    /// then make it visible. A failed write leaves memory untouched.
    async fn commit<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        T: Send,
        F: FnOnce(&mut Rows) -> Result<T, StoreError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut staged = self.memory.rows.read().clone();
        let out = change(&mut staged)?;
        if let Err(e) = self.persist(&staged.to_table()).await {
            tracing::error!(path = %self.path.display(), "account store write failed: {e}");
            return Err(e);
        }
        *self.memory.rows.write() = staged;
        Ok(out)
    }
}

#[async_trait]
impl AccountStore for FlatFileAccountStore {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.memory.get(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.memory.find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.memory.find_by_email(email).await
    }

    async fn find_by_phonenumber(
        &self,
        phonenumber: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.memory.find_by_phonenumber(phonenumber).await
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Account>, StoreError> {
        self.memory.find_by_reset_token(token).await
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        self.memory.list().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.memory.count().await
    }

    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        self.commit(|rows| rows.insert(new)).await
    }

    async fn update_fields(
        &self,
        id: AccountId,
        patch: &AccountPatch,
    ) -> Result<Account, StoreError> {
        self.commit(|rows| rows.patch(id, patch)).await
    }

    async fn toggle_disabled(&self, id: AccountId) -> Result<Account, StoreError> {
        self.commit(|rows| rows.modify(id, |a| a.disabled = !a.disabled)).await
    }

    async fn set_secret_hash(
        &self,
        id: AccountId,
        secret_hash: String,
    ) -> Result<Account, StoreError> {
        self.commit(|rows| rows.modify(id, |a| a.secret_hash = secret_hash)).await
    }

    async fn set_reset_token(
        &self,
        id: AccountId,
        token: String,
        expires_at: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        self.commit(|rows| {
            rows.modify(id, |a| {
                a.reset_token = Some(token);
                a.reset_token_expires_at = Some(expires_at);
            })
        })
        .await
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        secret_hash: String,
        now: DateTime<Utc>,
    ) -> Result<ResetRedemption, StoreError> {
        // nothing to write when no row holds the token
        if self.memory.find_by_reset_token(token).await?.is_none() {
            return Ok(ResetRedemption::Unknown);
        }
        self.commit(|rows| Ok(rows.redeem(token, secret_hash, now))).await
    }

    async fn delete(&self, id: AccountId) -> Result<Account, StoreError> {
        self.commit(|rows| rows.remove(id)).await
    }
}
