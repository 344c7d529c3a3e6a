//! Bearer-token session issuance and resolution.
//!
//! Tokens are opaque 64-character alphanumeric strings bound to exactly one
//! account. An account may hold any number of live tokens (multi-device);
//! tokens never expire server-side, they only die by explicit destroy.

mod memory;
mod postgres;

use std::sync::Arc;

use account_domain::{Account, AccountId};
use account_store::{AccountRepository, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use thiserror::Error;

pub use memory::InMemorySessionRepository;
pub use postgres::PostgresSessionRepository;

pub const TOKEN_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("account id '{0}' not valid")]
    AccountNotFound(AccountId),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Accounts(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, record: SessionRecord) -> Result<(), SessionError>;
    async fn find_account_id(&self, token: &str) -> Result<Option<AccountId>, SessionError>;
    async fn delete_token(&self, token: &str) -> Result<bool, SessionError>;
    async fn delete_all_for_account(&self, account_id: AccountId) -> Result<u64, SessionError>;
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Stateless session service over a session repository and the account
/// store. Resolved identities are handed back to the caller; the request
/// context, not this store, caches them for later pipeline stages.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<dyn SessionRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl SessionStore {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepository>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { sessions, accounts }
    }

    /// Create a token for an existing account.
    pub async fn issue(&self, account_id: AccountId) -> Result<String, SessionError> {
        if self.accounts.get_by_id(account_id).await?.is_none() {
            return Err(SessionError::AccountNotFound(account_id));
        }
        let token = generate_token();
        self.sessions
            .insert(SessionRecord {
                token: token.clone(),
                account_id,
                created_at: Utc::now(),
            })
            .await?;
        Ok(token)
    }

    /// Account bound to `token`, `None` when the token is unknown or the
    /// bound account has vanished.
    pub async fn resolve(&self, token: &str) -> Result<Option<Account>, SessionError> {
        let Some(account_id) = self.sessions.find_account_id(token).await? else {
            return Ok(None);
        };
        Ok(self.accounts.get_by_id(account_id).await?)
    }

    /// Single-device logout. Returns whether the token existed.
    pub async fn destroy(&self, token: &str) -> Result<bool, SessionError> {
        self.sessions.delete_token(token).await
    }

    /// Remove every session of the account. Idempotent; returns the number
    /// of sessions removed.
    pub async fn destroy_all(&self, account_id: AccountId) -> Result<u64, SessionError> {
        self.sessions.delete_all_for_account(account_id).await
    }
}
