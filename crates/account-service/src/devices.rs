use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use account_domain::AccountId;
use async_trait::async_trait;

/// Push-notification device registration, keyed by the client-supplied
/// handle hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub hash: String,
    pub account_id: AccountId,
    pub active: bool,
    pub is_apple: Option<bool>,
}

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn get_by_hash(&self, hash: &str) -> Result<Option<DeviceRecord>, String>;
    async fn upsert(&self, record: DeviceRecord) -> Result<(), String>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryDeviceRepository {
    devices: Arc<Mutex<HashMap<String, DeviceRecord>>>,
}

impl InMemoryDeviceRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.lock().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn get_by_hash(&self, hash: &str) -> Result<Option<DeviceRecord>, String> {
        Ok(self
            .devices
            .lock()
            .map_err(|_| "device store lock poisoned".to_string())?
            .get(hash)
            .cloned())
    }

    async fn upsert(&self, record: DeviceRecord) -> Result<(), String> {
        self.devices
            .lock()
            .map_err(|_| "device store lock poisoned".to_string())?
            .insert(record.hash.clone(), record);
        Ok(())
    }
}
