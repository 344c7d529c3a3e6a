use std::sync::{Arc, Mutex};

use account_domain::AccountId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One outgoing email, persisted for an external mailer to pick up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub sender_name: String,
    pub sender_email: String,
    pub purpose: String,
    pub account_id: AccountId,
    pub created: DateTime<Utc>,
}

#[async_trait]
pub trait EmailOutbox: Send + Sync {
    async fn enqueue(&self, message: EmailMessage) -> Result<(), String>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryEmailOutbox {
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl InMemoryEmailOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().map_or_else(|_| Vec::new(), |m| m.clone())
    }
}

#[async_trait]
impl EmailOutbox for InMemoryEmailOutbox {
    async fn enqueue(&self, message: EmailMessage) -> Result<(), String> {
        self.messages
            .lock()
            .map_err(|_| "email outbox lock poisoned".to_string())?
            .push(message);
        Ok(())
    }
}
