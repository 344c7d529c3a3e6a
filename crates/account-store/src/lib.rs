//! Account persistence ports and implementations.

mod memory;
mod postgres;

use account_domain::{Account, AccountId, AccountUpdate};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryAccountRepository;
pub use postgres::PostgresAccountRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("account with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Single-account lookup criteria. Replaces the original's stringly
/// field-name filters with the closed set of columns the gateway queries by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    Email(String),
    FacebookId(String),
    ReferralCode(String),
    RecoveryHash(String),
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn get_one_filtered(
        &self,
        filter: &AccountFilter,
    ) -> Result<Option<Account>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.get_one_filtered(&AccountFilter::Email(email.to_string()))
            .await
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// Apply a partial update. `StoreError::NotFound` when the id is unknown.
    async fn update(&self, id: AccountId, update: &AccountUpdate) -> Result<(), StoreError>;

    /// Whether any account other than `id` already uses `email`.
    async fn email_taken_by_other(
        &self,
        email: &str,
        id: AccountId,
    ) -> Result<bool, StoreError>;
}
