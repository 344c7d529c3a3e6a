use std::sync::Arc;

use account_domain::Account;
use account_store::AccountRepository;

use crate::error::ApiError;

/// Credential verification against the account store. Password hashes use
/// bcrypt; facebook logins compare the stored facebook id.
#[derive(Clone)]
pub struct Authenticator {
    accounts: Arc<dyn AccountRepository>,
}

impl Authenticator {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        let account = self
            .accounts
            .get_by_email(email)
            .await?
            .ok_or(ApiError::IdentityNotFound)?;
        let Some(hash) = account.password_hash.as_deref() else {
            return Err(ApiError::InvalidCredentials);
        };
        if bcrypt::verify(password, hash).unwrap_or(false) {
            Ok(account)
        } else {
            Err(ApiError::InvalidCredentials)
        }
    }

    pub async fn authenticate_facebook(
        &self,
        email: &str,
        facebook_id: &str,
    ) -> Result<Account, ApiError> {
        let account = self
            .accounts
            .get_by_email(email)
            .await?
            .ok_or(ApiError::IdentityNotFound)?;
        if account.facebook_id.as_deref() == Some(facebook_id) {
            Ok(account)
        } else {
            Err(ApiError::InvalidCredentials)
        }
    }
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST).map_err(|err| ApiError::Internal(err.to_string()))
}
