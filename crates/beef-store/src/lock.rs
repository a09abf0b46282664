//! Mutual exclusion for the record list's read-modify-write cycle
//!
//! With a shared remote backend the lock is a KV entry claimed through
//! `set_if_absent` with a short TTL, so a crashed holder never blocks writers
//! for long. Every mode also serializes writers inside this process.

use beef_util::{Clock, SystemClock};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{KvStore, StoreError, StoreResult};

/// Key holding the lock record
pub const LOCK_KEY: &str = "misses:lock";

/// Lock lifetime if the holder never releases it
pub const LOCK_TTL: Duration = Duration::from_millis(5000);

/// Acquisition attempts before giving up
pub const MAX_LOCK_ATTEMPTS: u32 = 3;

/// Backoff after failed attempt `n` is `n * LOCK_BACKOFF_STEP`
pub const LOCK_BACKOFF_STEP: Duration = Duration::from_millis(100);

/// How the lock coordinates with other writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Backend is shared between processes; claim the KV lock key
    Shared,
    /// Backend is private to this process; in-process exclusion is enough
    Local,
}

/// Lock guarding the record list
pub struct MissLock {
    kv: Arc<dyn KvStore>,
    mode: LockMode,
    clock: Arc<dyn Clock>,
    local: Mutex<()>,
}

impl MissLock {
    pub fn new(kv: Arc<dyn KvStore>, mode: LockMode) -> Self {
        Self::with_clock(kv, mode, Arc::new(SystemClock))
    }

    pub fn with_clock(kv: Arc<dyn KvStore>, mode: LockMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            mode,
            clock,
            local: Mutex::new(()),
        }
    }

    /// Try once to claim the lock key
    pub async fn acquire(&self) -> StoreResult<bool> {
        match self.mode {
            LockMode::Local => Ok(true),
            LockMode::Shared => {
                let stamp = json!(self.clock.now_millis());
                self.kv.set_if_absent(LOCK_KEY, stamp, LOCK_TTL).await
            }
        }
    }

    /// Release the lock key. Failures are logged; the TTL cleans up.
    pub async fn release(&self) {
        if self.mode == LockMode::Local {
            return;
        }
        if let Err(e) = self.kv.delete(LOCK_KEY).await {
            warn!(error = %e, "Failed to release lock, leaving it to expire");
        }
    }

    /// Run `op` while holding the lock.
    ///
    /// `op` never runs if the lock cannot be acquired within
    /// [`MAX_LOCK_ATTEMPTS`]; once it has run the lock is always released,
    /// whatever `op` returned.
    pub async fn with_lock<T, F, Fut>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let _local = self.local.lock().await;

        let mut acquired = false;
        for attempt in 1..=MAX_LOCK_ATTEMPTS {
            match self.acquire().await {
                Ok(true) => {
                    acquired = true;
                    break;
                }
                Ok(false) => debug!(attempt, "Lock held by another writer"),
                Err(e) => warn!(attempt, error = %e, "Lock acquisition failed"),
            }

            if attempt < MAX_LOCK_ATTEMPTS {
                self.clock.sleep(LOCK_BACKOFF_STEP * attempt).await;
            }
        }

        if !acquired {
            warn!(attempts = MAX_LOCK_ATTEMPTS, "Giving up on lock");
            return Err(StoreError::LockUnavailable {
                attempts: MAX_LOCK_ATTEMPTS,
            });
        }

        let result = op().await;
        self.release().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKv;
    use async_trait::async_trait;
    use beef_util::ManualClock;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Backend whose every call fails, counting lock claims and deletes
    #[derive(Default)]
    struct FailingKv {
        claims: AtomicU32,
        deletes: AtomicU32,
    }

    #[async_trait]
    impl KvStore for FailingKv {
        async fn get(&self, _key: &str) -> StoreResult<Option<Value>> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Value) -> StoreResult<()> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn set_if_absent(
            &self,
            _key: &str,
            _value: Value,
            _ttl: Duration,
        ) -> StoreResult<bool> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    fn shared_lock(start_millis: i64) -> (Arc<MemoryKv>, Arc<ManualClock>, MissLock) {
        let clock = Arc::new(ManualClock::new(start_millis));
        let kv = Arc::new(MemoryKv::with_clock(clock.clone()));
        let lock = MissLock::with_clock(kv.clone(), LockMode::Shared, clock.clone());
        (kv, clock, lock)
    }

    #[tokio::test]
    async fn test_with_lock_runs_and_releases() {
        let (kv, _clock, lock) = shared_lock(1_000);

        let value = lock
            .with_lock(|| async {
                assert!(kv.get(LOCK_KEY).await.unwrap().is_some());
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(kv.get(LOCK_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lock_record_holds_timestamp() {
        let (kv, _clock, lock) = shared_lock(1_234);

        assert!(lock.acquire().await.unwrap());
        assert_eq!(kv.get(LOCK_KEY).await.unwrap(), Some(json!(1_234)));
        assert!(!lock.acquire().await.unwrap());

        lock.release().await;
        assert!(lock.acquire().await.unwrap());
    }

    #[tokio::test]
    async fn test_releases_after_failed_operation() {
        let (kv, _clock, lock) = shared_lock(0);

        let result: StoreResult<()> = lock
            .with_lock(|| async { Err(StoreError::Backend("write failed".into())) })
            .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(kv.get(LOCK_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_gives_up_when_held_elsewhere() {
        let (kv, clock, lock) = shared_lock(0);
        kv.set(LOCK_KEY, json!(0)).await.unwrap();

        let ran = AtomicBool::new(false);
        let result = lock
            .with_lock(|| async {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StoreError::LockUnavailable { attempts: 3 })));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        // Someone else's lock is left alone
        assert!(kv.get(LOCK_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_backend_errors_count_as_failed_attempts() {
        let clock = Arc::new(ManualClock::new(0));
        let kv = Arc::new(FailingKv::default());
        let lock = MissLock::with_clock(kv.clone(), LockMode::Shared, clock.clone());

        let ran = AtomicBool::new(false);
        let result = lock
            .with_lock(|| async {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StoreError::LockUnavailable { attempts: 3 })));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(kv.claims.load(Ordering::SeqCst), MAX_LOCK_ATTEMPTS);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        // Never held, so never released
        assert_eq!(kv.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_acquires_once_foreign_lock_expires() {
        let (kv, clock, lock) = shared_lock(0);
        kv.set_if_absent(LOCK_KEY, json!(0), Duration::from_millis(150))
            .await
            .unwrap();

        let result = lock.with_lock(|| async { Ok("done") }).await.unwrap();

        assert_eq!(result, "done");
        // Failed at t=0 and t=100, succeeded at t=300
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_local_mode_never_touches_kv() {
        let clock = Arc::new(ManualClock::new(0));
        let kv = Arc::new(MemoryKv::with_clock(clock.clone()));
        kv.set(LOCK_KEY, json!("stale")).await.unwrap();
        let lock = MissLock::with_clock(kv.clone(), LockMode::Local, clock.clone());

        lock.with_lock(|| async { Ok(()) }).await.unwrap();

        assert!(clock.sleeps().is_empty());
        assert_eq!(kv.get(LOCK_KEY).await.unwrap(), Some(json!("stale")));
    }
}
