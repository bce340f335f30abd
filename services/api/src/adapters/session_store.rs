//! services/api/src/adapters/session_store.rs
//!
//! An in-memory `SessionStore` with a byte quota, standing in for browser
//! session storage. One instance lives as long as its browser session.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use skill_tutor_core::{PortError, PortResult, SessionStore};

pub struct InMemorySessionStore {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: usize,
}

impl InMemorySessionStore {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes,
        }
    }
}

fn poisoned<T>(_: T) -> PortError {
    PortError::Storage("session storage lock poisoned".to_string())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        let items = self.items.lock().map_err(poisoned)?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        let mut items = self.items.lock().map_err(poisoned)?;
        let used: usize = items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let needed = used + key.len() + value.len();
        if needed > self.quota_bytes {
            return Err(PortError::Storage(format!(
                "QuotaExceededError: {} bytes needed, {} allowed",
                needed, self.quota_bytes
            )));
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
