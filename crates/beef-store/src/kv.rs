//! Key-value store trait

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::StoreResult;

/// Minimal key-value capability set shared by every backend.
///
/// Values are JSON documents. `set_if_absent` must be atomic: it stores
/// only when the key is missing or expired and reports whether it stored.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<bool>;
}

/// Read `key` and decode it as `T`
pub async fn get_json<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> StoreResult<Option<T>> {
    match kv.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode `value` and store it under `key`
pub async fn set_json<T: Serialize + ?Sized>(kv: &dyn KvStore, key: &str, value: &T) -> StoreResult<()> {
    kv.set(key, serde_json::to_value(value)?).await
}
