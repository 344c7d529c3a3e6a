use account_domain::AccountId;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{SessionError, SessionRecord, SessionRepository};

fn db_err(err: impl std::fmt::Display) -> SessionError {
    SessionError::Unavailable(err.to_string())
}

#[derive(Debug, Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        sqlx::query(
            "INSERT INTO account_api_session (token, account_id, created) VALUES ($1, $2, $3)",
        )
        .bind(&record.token)
        .bind(record.account_id.0)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_account_id(&self, token: &str) -> Result<Option<AccountId>, SessionError> {
        let row = sqlx::query("SELECT account_id FROM account_api_session WHERE token = $1 LIMIT 1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|row| {
            row.try_get::<Uuid, _>("account_id")
                .map(AccountId)
                .map_err(db_err)
        })
        .transpose()
    }

    async fn delete_token(&self, token: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM account_api_session WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_account(&self, account_id: AccountId) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM account_api_session WHERE account_id = $1")
            .bind(account_id.0)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}
