use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::DomainError;
use crate::ids::AccountId;

/// Account lifecycle. Transitions are one-directional:
/// `New -> WaitingForActivation -> Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountState {
    New,
    WaitingForActivation,
    Active,
}

impl AccountState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::WaitingForActivation => "WAITING_FOR_ACTIVATION",
            Self::Active => "ACTIVE",
        }
    }
}

impl std::fmt::Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "NEW" => Ok(Self::New),
            "WAITING_FOR_ACTIVATION" => Ok(Self::WaitingForActivation),
            "ACTIVE" => Ok(Self::Active),
            other => Err(DomainError::UnknownState(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationSource {
    Web,
    App,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: Option<String>,
    pub state: AccountState,
    pub created: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub activation_hash: Option<String>,
    pub activation_email_sent: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub hometown: Option<String>,
    pub avatar_url: Option<String>,
    pub facebook_id: Option<String>,
    pub facebook_connected: bool,
    pub referral_code: Option<String>,
    pub inviter_account_id: Option<AccountId>,
    pub recovery_hash: Option<String>,
    pub recovery_expires_at: Option<DateTime<Utc>>,
    pub registration_source: RegistrationSource,
}

impl Account {
    /// Fresh account as created by signup, before any activation email.
    #[must_use]
    pub fn new(email: String, source: RegistrationSource, now: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new(),
            email,
            password_hash: None,
            state: AccountState::New,
            created: now,
            last_seen: None,
            activation_hash: None,
            activation_email_sent: None,
            name: None,
            date_of_birth: None,
            gender: None,
            hometown: None,
            avatar_url: None,
            facebook_id: None,
            facebook_connected: false,
            referral_code: None,
            inviter_account_id: None,
            recovery_hash: None,
            recovery_expires_at: None,
            registration_source: source,
        }
    }

    /// Move the account into `WaitingForActivation`, stamping the activation
    /// email timestamp and hash. Only valid from `New`.
    pub fn request_activation(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.state != AccountState::New {
            return Err(DomainError::InvalidStateTransition {
                from: self.state,
                to: AccountState::WaitingForActivation,
            });
        }
        self.activation_hash = Some(self.activation_hash_value());
        self.activation_email_sent = Some(now);
        self.state = AccountState::WaitingForActivation;
        Ok(())
    }

    /// Move the account into `Active`. Only valid from `WaitingForActivation`.
    pub fn activate(&mut self) -> Result<(), DomainError> {
        if self.state != AccountState::WaitingForActivation {
            return Err(DomainError::InvalidStateTransition {
                from: self.state,
                to: AccountState::Active,
            });
        }
        self.state = AccountState::Active;
        Ok(())
    }

    /// Deterministic activation hash bound to this account's identity and
    /// creation instant.
    #[must_use]
    pub fn activation_hash_value(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.0.as_bytes());
        hasher.update(self.created.to_rfc3339().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Partial update applied to a stored account. `None` leaves the field
/// untouched; the double-`Option` fields distinguish "leave" from "clear".
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub state: Option<AccountState>,
    pub last_seen: Option<DateTime<Utc>>,
    pub activation_hash: Option<String>,
    pub activation_email_sent: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub hometown: Option<String>,
    pub avatar_url: Option<String>,
    pub facebook_id: Option<String>,
    pub facebook_connected: Option<bool>,
    pub referral_code: Option<String>,
    pub inviter_account_id: Option<AccountId>,
    pub recovery_hash: Option<Option<String>>,
    pub recovery_expires_at: Option<Option<DateTime<Utc>>>,
}

impl AccountUpdate {
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(value) = &self.email {
            account.email = value.clone();
        }
        if let Some(value) = &self.password_hash {
            account.password_hash = Some(value.clone());
        }
        if let Some(value) = self.state {
            account.state = value;
        }
        if let Some(value) = self.last_seen {
            account.last_seen = Some(value);
        }
        if let Some(value) = &self.activation_hash {
            account.activation_hash = Some(value.clone());
        }
        if let Some(value) = self.activation_email_sent {
            account.activation_email_sent = Some(value);
        }
        if let Some(value) = &self.name {
            account.name = Some(value.clone());
        }
        if let Some(value) = self.date_of_birth {
            account.date_of_birth = Some(value);
        }
        if let Some(value) = &self.gender {
            account.gender = Some(value.clone());
        }
        if let Some(value) = &self.hometown {
            account.hometown = Some(value.clone());
        }
        if let Some(value) = &self.avatar_url {
            account.avatar_url = Some(value.clone());
        }
        if let Some(value) = &self.facebook_id {
            account.facebook_id = Some(value.clone());
        }
        if let Some(value) = self.facebook_connected {
            account.facebook_connected = value;
        }
        if let Some(value) = &self.referral_code {
            account.referral_code = Some(value.clone());
        }
        if let Some(value) = self.inviter_account_id {
            account.inviter_account_id = Some(value);
        }
        if let Some(value) = &self.recovery_hash {
            account.recovery_hash = value.clone();
        }
        if let Some(value) = self.recovery_expires_at {
            account.recovery_expires_at = value;
        }
    }
}
