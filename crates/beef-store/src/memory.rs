//! In-process key-value backend
//!
//! Used when no remote KV service is configured. Nothing survives a restart
//! and nothing is shared between instances.

use async_trait::async_trait;
use beef_util::{Clock, SystemClock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{KvStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    /// Epoch milliseconds after which the entry is gone
    expires_at: Option<i64>,
}

/// HashMap-backed store with lazily checked expiry
#[derive(Debug)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock_entries(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, StoredValue>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    /// Drop `key` if expired; returns the live value otherwise
    fn live_value(entries: &mut HashMap<String, StoredValue>, key: &str, now: i64) -> Option<Value> {
        let expired = match entries.get(key) {
            Some(stored) => stored.expires_at.is_some_and(|at| now > at),
            None => return None,
        };

        if expired {
            entries.remove(key);
            None
        } else {
            entries.get(key).map(|stored| stored.value.clone())
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = self.clock.now_millis();
        let mut entries = self.lock_entries()?;
        Ok(Self::live_value(&mut entries, key, now))
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut entries = self.lock_entries()?;
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.lock_entries()?;
        entries.remove(key);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.now_millis();
        let mut entries = self.lock_entries()?;

        if Self::live_value(&mut entries, key, now).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: Some(
                    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)),
                ),
            },
        );
        Ok(true)
    }
}
