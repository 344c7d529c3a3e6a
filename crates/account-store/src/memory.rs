use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use account_domain::{Account, AccountId, AccountUpdate};
use async_trait::async_trait;

use crate::{AccountFilter, AccountRepository, StoreError};

#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountRepository {
    accounts: Arc<Mutex<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<AccountId, Account>>, StoreError> {
        self.accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches(account: &Account, filter: &AccountFilter) -> bool {
    match filter {
        AccountFilter::Email(email) => account.email == *email,
        AccountFilter::FacebookId(facebook_id) => {
            account.facebook_id.as_deref() == Some(facebook_id.as_str())
        }
        AccountFilter::ReferralCode(code) => {
            account.referral_code.as_deref() == Some(code.as_str())
        }
        AccountFilter::RecoveryHash(hash) => {
            account.recovery_hash.as_deref() == Some(hash.as_str())
        }
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn get_one_filtered(
        &self,
        filter: &AccountFilter,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .find(|account| matches(account, filter))
            .cloned())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.values().any(|existing| existing.email == account.email) {
            return Err(StoreError::DuplicateEmail(account.email));
        }
        guard.insert(account.id, account);
        Ok(())
    }

    async fn update(&self, id: AccountId, update: &AccountUpdate) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let account = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
        update.apply_to(account);
        Ok(())
    }

    async fn email_taken_by_other(
        &self,
        email: &str,
        id: AccountId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .values()
            .any(|account| account.email == email && account.id != id))
    }
}
