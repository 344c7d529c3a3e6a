use std::sync::LazyLock;
use std::sync::Arc;

use account_domain::AccountId;
use account_store::AccountRepository;
use regex::Regex;

use crate::error::ApiError;

pub const PASSWORD_MIN_LENGTH: usize = 6;

#[allow(clippy::expect_used)]
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"));

/// Signup/profile input validation backed by the account store for
/// uniqueness checks.
#[derive(Clone)]
pub struct Validator {
    accounts: Arc<dyn AccountRepository>,
}

impl Validator {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    #[must_use]
    pub fn is_email(value: &str) -> bool {
        EMAIL_REGEX.is_match(value)
    }

    /// Syntax plus not-yet-registered.
    pub async fn validate_signup_email(&self, email: &str) -> Result<(), ApiError> {
        if !Self::is_email(email) {
            return Err(ApiError::InvalidEmail(format!(
                "'{email}' is not a valid email address."
            )));
        }
        if self.accounts.get_by_email(email).await?.is_some() {
            return Err(ApiError::UsernameTaken);
        }
        Ok(())
    }

    /// Syntax plus not-taken-by-anyone-else; the account keeping its own
    /// address is allowed.
    pub async fn validate_email_change(
        &self,
        email: &str,
        account_id: AccountId,
    ) -> Result<(), ApiError> {
        if !Self::is_email(email) {
            return Err(ApiError::InvalidEmail(format!(
                "'{email}' is not a valid email address."
            )));
        }
        if self.accounts.email_taken_by_other(email, account_id).await? {
            return Err(ApiError::UsernameTaken);
        }
        Ok(())
    }

    pub fn validate_password(password: &str, login: &str) -> Result<(), ApiError> {
        if password.chars().count() < PASSWORD_MIN_LENGTH {
            return Err(ApiError::InvalidPassword(format!(
                "Password has to be at least {PASSWORD_MIN_LENGTH} letters long."
            )));
        }
        if password == login {
            return Err(ApiError::InvalidPassword(
                "Password and login must not be the same.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use account_domain::{Account, RegistrationSource};
    use account_store::InMemoryAccountRepository;
    use chrono::Utc;

    use super::*;

    #[test]
    fn email_syntax_check_rejects_the_obvious() {
        assert!(Validator::is_email("user@example.com"));
        assert!(Validator::is_email("user.name+tag@sub.example.co"));
        assert!(!Validator::is_email("userexample.com"));
        assert!(!Validator::is_email("user@nodot"));
        assert!(!Validator::is_email("user @example.com"));
        assert!(!Validator::is_email(""));
    }

    #[test]
    fn password_rules_enforce_length_and_difference_from_login() {
        Validator::validate_password("secret1", "a@example.com").expect("valid");
        let err = Validator::validate_password("short", "a@example.com").expect_err("short");
        assert!(matches!(err, ApiError::InvalidPassword(_)));
        let err =
            Validator::validate_password("a@example.com", "a@example.com").expect_err("same");
        assert!(matches!(err, ApiError::InvalidPassword(_)));
    }

    #[tokio::test]
    async fn signup_email_must_be_unused() {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        accounts
            .insert(Account::new(
                "taken@example.com".to_string(),
                RegistrationSource::App,
                Utc::now(),
            ))
            .await
            .expect("seed");
        let validator = Validator::new(accounts);

        validator
            .validate_signup_email("new@example.com")
            .await
            .expect("free");
        let err = validator
            .validate_signup_email("taken@example.com")
            .await
            .expect_err("taken");
        assert!(matches!(err, ApiError::UsernameTaken));
        let err = validator
            .validate_signup_email("not-an-email")
            .await
            .expect_err("syntax");
        assert!(matches!(err, ApiError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn email_change_allows_keeping_own_address() {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let own = Account::new(
            "own@example.com".to_string(),
            RegistrationSource::App,
            Utc::now(),
        );
        let own_id = own.id;
        accounts.insert(own).await.expect("seed own");
        accounts
            .insert(Account::new(
                "other@example.com".to_string(),
                RegistrationSource::App,
                Utc::now(),
            ))
            .await
            .expect("seed other");
        let validator = Validator::new(accounts);

        validator
            .validate_email_change("own@example.com", own_id)
            .await
            .expect("own address");
        let err = validator
            .validate_email_change("other@example.com", own_id)
            .await
            .expect_err("taken by other");
        assert!(matches!(err, ApiError::UsernameTaken));
    }
}
