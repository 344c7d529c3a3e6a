use account_domain::{
    Account, AccountId, AccountState, AccountUpdate, RegistrationSource,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{AccountFilter, AccountRepository, StoreError};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, state, created, last_seen, \
     activation_hash, activation_email_sent, name, date_of_birth, gender, hometown, \
     avatar_url, facebook_id, facebook_connected, referral_code, inviter_account_id, \
     recovery_hash, recovery_expires_at, registration_source";

#[derive(Debug, Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let state: String = row.try_get("state").map_err(db_err)?;
    let source: String = row.try_get("registration_source").map_err(db_err)?;
    Ok(Account {
        id: AccountId(row.try_get::<Uuid, _>("id").map_err(db_err)?),
        email: row.try_get("email").map_err(db_err)?,
        password_hash: row.try_get("password_hash").map_err(db_err)?,
        state: state.parse::<AccountState>().map_err(db_err)?,
        created: row.try_get("created").map_err(db_err)?,
        last_seen: row.try_get("last_seen").map_err(db_err)?,
        activation_hash: row.try_get("activation_hash").map_err(db_err)?,
        activation_email_sent: row.try_get("activation_email_sent").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        date_of_birth: row
            .try_get::<Option<NaiveDate>, _>("date_of_birth")
            .map_err(db_err)?,
        gender: row.try_get("gender").map_err(db_err)?,
        hometown: row.try_get("hometown").map_err(db_err)?,
        avatar_url: row.try_get("avatar_url").map_err(db_err)?,
        facebook_id: row.try_get("facebook_id").map_err(db_err)?,
        facebook_connected: row.try_get("facebook_connected").map_err(db_err)?,
        referral_code: row.try_get("referral_code").map_err(db_err)?,
        inviter_account_id: row
            .try_get::<Option<Uuid>, _>("inviter_account_id")
            .map_err(db_err)?
            .map(AccountId),
        recovery_hash: row.try_get("recovery_hash").map_err(db_err)?,
        recovery_expires_at: row
            .try_get::<Option<DateTime<Utc>>, _>("recovery_expires_at")
            .map_err(db_err)?,
        registration_source: match source.as_str() {
            "WEB" => RegistrationSource::Web,
            "APP" => RegistrationSource::App,
            other => return Err(db_err(format!("unknown registration source '{other}'"))),
        },
    })
}

fn source_str(source: RegistrationSource) -> &'static str {
    match source {
        RegistrationSource::Web => "WEB",
        RegistrationSource::App => "APP",
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = $1 LIMIT 1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_one_filtered(
        &self,
        filter: &AccountFilter,
    ) -> Result<Option<Account>, StoreError> {
        let (column, value) = match filter {
            AccountFilter::Email(value) => ("email", value),
            AccountFilter::FacebookId(value) => ("facebook_id", value),
            AccountFilter::ReferralCode(value) => ("referral_code", value),
            AccountFilter::RecoveryHash(value) => ("recovery_hash", value),
        };
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE {column} = $1 LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let existing = sqlx::query("SELECT 1 FROM account WHERE email = $1 LIMIT 1")
            .bind(&account.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Err(StoreError::DuplicateEmail(account.email));
        }
        sqlx::query(&format!(
            "INSERT INTO account ({ACCOUNT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)"
        ))
        .bind(account.id.0)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.state.as_str())
        .bind(account.created)
        .bind(account.last_seen)
        .bind(&account.activation_hash)
        .bind(account.activation_email_sent)
        .bind(&account.name)
        .bind(account.date_of_birth)
        .bind(&account.gender)
        .bind(&account.hometown)
        .bind(&account.avatar_url)
        .bind(&account.facebook_id)
        .bind(account.facebook_connected)
        .bind(&account.referral_code)
        .bind(account.inviter_account_id.map(|id| id.0))
        .bind(&account.recovery_hash)
        .bind(account.recovery_expires_at)
        .bind(source_str(account.registration_source))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update(&self, id: AccountId, update: &AccountUpdate) -> Result<(), StoreError> {
        // Read-modify-write keeps the partial-update semantics in one place
        // (AccountUpdate::apply_to) instead of dynamic SQL.
        let mut account = self.get_by_id(id).await?.ok_or(StoreError::NotFound)?;
        update.apply_to(&mut account);
        sqlx::query(
            "UPDATE account SET email = $2, password_hash = $3, state = $4, last_seen = $5, \
             activation_hash = $6, activation_email_sent = $7, name = $8, date_of_birth = $9, \
             gender = $10, hometown = $11, avatar_url = $12, facebook_id = $13, \
             facebook_connected = $14, referral_code = $15, inviter_account_id = $16, \
             recovery_hash = $17, recovery_expires_at = $18 WHERE id = $1",
        )
        .bind(account.id.0)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.state.as_str())
        .bind(account.last_seen)
        .bind(&account.activation_hash)
        .bind(account.activation_email_sent)
        .bind(&account.name)
        .bind(account.date_of_birth)
        .bind(&account.gender)
        .bind(&account.hometown)
        .bind(&account.avatar_url)
        .bind(&account.facebook_id)
        .bind(account.facebook_connected)
        .bind(&account.referral_code)
        .bind(account.inviter_account_id.map(|id| id.0))
        .bind(&account.recovery_hash)
        .bind(account.recovery_expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn email_taken_by_other(
        &self,
        email: &str,
        id: AccountId,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS taken FROM account WHERE email = $1 AND id != $2")
            .bind(email)
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let taken: i64 = row.try_get("taken").map_err(db_err)?;
        Ok(taken > 0)
    }
}
