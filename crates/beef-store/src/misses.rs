//! Missed delivery records
//!
//! The whole collection is one JSON array under [`MISSES_KEY`], newest first.
//! Mutations re-read the list inside [`MissLock`] so concurrent writers cannot
//! lose each other's updates. Plain reads take no lock and may see the state
//! from just before an in-flight write.

use beef_api::{MAX_RECORDS, MissedDelivery};
use beef_util::{Clock, MissId, SystemClock};
use std::sync::Arc;
use tracing::{error, info};

use crate::{KvStore, LockMode, MissLock, StoreError, StoreResult, get_json, set_json};

/// Key holding the record list
pub const MISSES_KEY: &str = "misses";

/// Owner of the record list
pub struct MissStore {
    kv: Arc<dyn KvStore>,
    lock: MissLock,
    clock: Arc<dyn Clock>,
}

impl MissStore {
    pub fn new(kv: Arc<dyn KvStore>, mode: LockMode) -> Self {
        Self::with_clock(kv, mode, Arc::new(SystemClock))
    }

    pub fn with_clock(kv: Arc<dyn KvStore>, mode: LockMode, clock: Arc<dyn Clock>) -> Self {
        let lock = MissLock::with_clock(kv.clone(), mode, clock.clone());
        Self { kv, lock, clock }
    }

    /// All records, newest first. Read failures are logged and yield an
    /// empty list.
    pub async fn list(&self) -> Vec<MissedDelivery> {
        match self.try_list().await {
            Ok(misses) => misses,
            Err(e) => {
                error!(error = %e, "Failed to read misses");
                Vec::new()
            }
        }
    }

    /// All records, newest first, propagating read failures
    pub async fn try_list(&self) -> StoreResult<Vec<MissedDelivery>> {
        Ok(get_json(self.kv.as_ref(), MISSES_KEY).await?.unwrap_or_default())
    }

    pub async fn count(&self) -> usize {
        self.list().await.len()
    }

    pub async fn try_count(&self) -> StoreResult<usize> {
        Ok(self.try_list().await?.len())
    }

    /// Record a new miss. Inputs are expected to be validated already.
    pub async fn add(&self, date: &str, note: &str) -> StoreResult<MissedDelivery> {
        self.lock
            .with_lock(|| async {
                let mut misses = self.try_list().await?;

                if misses.len() >= MAX_RECORDS {
                    return Err(StoreError::RecordLimit { max: MAX_RECORDS });
                }

                let miss = MissedDelivery {
                    id: fresh_id(&misses),
                    date: date.to_string(),
                    note: note.to_string(),
                    created_at: self.clock.now_millis(),
                };

                misses.insert(0, miss.clone());
                set_json(self.kv.as_ref(), MISSES_KEY, &misses).await?;

                info!(id = %miss.id, date = %miss.date, total = misses.len(), "Miss recorded");
                Ok(miss)
            })
            .await
    }

    /// Remove the record with `id`. Returns false, without writing, if no
    /// record matched.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.lock
            .with_lock(|| async {
                let misses = self.try_list().await?;
                let before = misses.len();

                let remaining: Vec<MissedDelivery> =
                    misses.into_iter().filter(|m| m.id != *id).collect();

                if remaining.len() == before {
                    return Ok(false);
                }

                set_json(self.kv.as_ref(), MISSES_KEY, &remaining).await?;
                info!(id = %id, total = remaining.len(), "Miss deleted");
                Ok(true)
            })
            .await
    }
}

fn fresh_id(existing: &[MissedDelivery]) -> MissId {
    loop {
        let id = MissId::generate();
        if !existing.iter().any(|m| m.id == id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKv;
    use async_trait::async_trait;
    use beef_util::ManualClock;
    use serde_json::Value;
    use std::time::Duration;

    fn memory_store() -> (Arc<MemoryKv>, MissStore) {
        let kv = Arc::new(MemoryKv::new());
        let store = MissStore::new(kv.clone(), LockMode::Local);
        (kv, store)
    }

    fn seeded(n: usize) -> Vec<MissedDelivery> {
        (0..n)
            .map(|i| MissedDelivery {
                id: MissId::new(format!("seed{i:06}")),
                date: "2024-01-01".into(),
                note: String::new(),
                created_at: i as i64,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_store() {
        let (_kv, store) = memory_store();
        assert!(store.list().await.is_empty());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_add_list_delete_round_trip() {
        let (_kv, store) = memory_store();

        let miss = store.add("2024-01-15", "left in the rain").await.unwrap();
        assert_eq!(miss.id.as_str().len(), 10);

        let misses = store.list().await;
        let matching: Vec<_> = misses.iter().filter(|m| m.date == "2024-01-15").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].note, "left in the rain");
        assert_eq!(matching[0].id, miss.id);

        assert!(store.delete(miss.id.as_str()).await.unwrap());
        assert!(store.list().await.iter().all(|m| m.id != miss.id));
    }

    #[tokio::test]
    async fn test_newest_first() {
        let (_kv, store) = memory_store();

        let a = store.add("2024-01-01", "A").await.unwrap();
        let b = store.add("2024-01-02", "B").await.unwrap();

        let misses = store.list().await;
        let pos_a = misses.iter().position(|m| m.id == a.id).unwrap();
        let pos_b = misses.iter().position(|m| m.id == b.id).unwrap();
        assert!(pos_b < pos_a);
    }

    #[tokio::test]
    async fn test_created_at_comes_from_clock() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = MissStore::with_clock(Arc::new(MemoryKv::new()), LockMode::Shared, clock.clone());

        let first = store.add("2024-01-01", "").await.unwrap();
        clock.advance(Duration::from_secs(1));
        let second = store.add("2024-01-01", "").await.unwrap();

        assert_eq!(first.created_at, 1_700_000_000_000);
        assert_eq!(second.created_at, 1_700_000_001_000);
    }

    #[tokio::test]
    async fn test_delete_missing_id_leaves_list_unchanged() {
        let (kv, store) = memory_store();
        store.add("2024-01-15", "keep me").await.unwrap();
        let before = kv.get(MISSES_KEY).await.unwrap();

        assert!(!store.delete("nope123456").await.unwrap());
        assert_eq!(kv.get(MISSES_KEY).await.unwrap(), before);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_record_limit() {
        let (kv, store) = memory_store();
        set_json(kv.as_ref(), MISSES_KEY, &seeded(MAX_RECORDS)).await.unwrap();
        assert_eq!(store.count().await, MAX_RECORDS);

        let err = store.add("2024-01-15", "one too many").await.unwrap_err();
        assert!(matches!(err, StoreError::RecordLimit { max: MAX_RECORDS }));
        assert!(err.to_string().contains("Maximum record limit (1000)"));
        assert_eq!(store.count().await, MAX_RECORDS);

        // Deleting one makes room again
        assert!(store.delete("seed000000").await.unwrap());
        store.add("2024-01-15", "fits now").await.unwrap();
        assert_eq!(store.count().await, MAX_RECORDS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_not_lost() {
        let kv = Arc::new(MemoryKv::new());
        let store = Arc::new(MissStore::new(kv, LockMode::Shared));

        let handles: Vec<_> = (0..25)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.add("2024-01-15", &format!("note {i}")).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let misses = store.list().await;
        assert_eq!(misses.len(), 25);
        let mut ids: Vec<_> = misses.iter().map(|m| m.id.clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        assert_eq!(ids.len(), 25);
    }

    /// Backend whose reads always fail
    struct BrokenKv;

    #[async_trait]
    impl KvStore for BrokenKv {
        async fn get(&self, _key: &str) -> StoreResult<Option<Value>> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: Value) -> StoreResult<()> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
        async fn set_if_absent(&self, _key: &str, _value: Value, _ttl: Duration) -> StoreResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_read_failures_degrade_to_empty() {
        let store = MissStore::new(Arc::new(BrokenKv), LockMode::Shared);

        assert!(store.list().await.is_empty());
        assert_eq!(store.count().await, 0);
        assert!(store.try_list().await.is_err());
        assert!(store.try_count().await.is_err());
    }

    #[tokio::test]
    async fn test_write_paths_propagate_failures() {
        let store = MissStore::new(Arc::new(BrokenKv), LockMode::Shared);

        assert!(matches!(
            store.add("2024-01-15", "").await,
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(
            store.delete("abcdefghij").await,
            Err(StoreError::Backend(_))
        ));
    }
}
