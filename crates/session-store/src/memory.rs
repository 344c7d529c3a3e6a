use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use account_domain::AccountId;
use async_trait::async_trait;

use crate::{SessionError, SessionRecord, SessionRepository};

#[derive(Debug, Default, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionRecord>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|_| SessionError::Unavailable("session store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        self.lock()?.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find_account_id(&self, token: &str) -> Result<Option<AccountId>, SessionError> {
        Ok(self.lock()?.get(token).map(|record| record.account_id))
    }

    async fn delete_token(&self, token: &str) -> Result<bool, SessionError> {
        Ok(self.lock()?.remove(token).is_some())
    }

    async fn delete_all_for_account(&self, account_id: AccountId) -> Result<u64, SessionError> {
        let mut guard = self.lock()?;
        let before = guard.len();
        guard.retain(|_, record| record.account_id != account_id);
        Ok((before - guard.len()) as u64)
    }
}
