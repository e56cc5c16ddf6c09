use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::CacheError;
use crate::executor::{Executor, run_executor};
use crate::manager::{BaseManager, CacheManager};
use crate::options::{ReadOptions, WriteOptions};
use crate::record::Record;
use crate::serializer;
use crate::storage::BaseStorage;
use crate::strategy::LockedKeyRetrieveStrategy;
use crate::utils::now_ms;

/// Name the read-through manager is registered under.
pub const READ_THROUGH_MANAGER: &str = "read-through";

/// Serve from cache while the record is alive and its tags are current;
/// otherwise load through the single-flight executor and write back.
///
/// A record is served iff it is present, not time-expired, carries a
/// value, and none of its tags has been touched since it was written.
pub struct ReadThroughManager {
    base: BaseManager,
}

impl ReadThroughManager {
    /// Create a manager over `storage`.
    pub fn new(storage: Arc<BaseStorage>) -> Self {
        ReadThroughManager {
            base: BaseManager::new(storage),
        }
    }

    /// Register an additional locked-key strategy.
    pub fn register_strategy(&mut self, strategy: Arc<dyn LockedKeyRetrieveStrategy>) {
        self.base.register_strategy(strategy);
    }

    async fn is_record_valid(&self, record: &Record) -> bool {
        if record.value.is_none() || record.is_expired(now_ms()) {
            return false;
        }
        !self.base.storage().is_outdated(record).await
    }
}

#[async_trait]
impl CacheManager for ReadThroughManager {
    fn name(&self) -> &'static str {
        READ_THROUGH_MANAGER
    }

    async fn get(
        &self,
        key: &str,
        executor: Executor,
        options: ReadOptions,
    ) -> Result<Value, CacheError> {
        let record = match self.base.storage().get(key).await {
            Ok(record) => record,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, falling back to executor");
                return run_executor(executor).await;
            }
        };

        if let Some(ref record) = record
            && self.is_record_valid(record).await
            && let Some(ref encoded) = record.value
        {
            match serializer::decode::<Value>(encoded) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(key, error = %err, "failed to decode cached value, refreshing")
                }
            }
        }

        self.base
            .update_cache_and_get_result(self, key, executor, options)
            .await
    }

    async fn set(
        &self,
        key: &str,
        value: &Value,
        options: WriteOptions,
    ) -> Result<Record, CacheError> {
        self.base.storage().set(key, value, &options).await
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.base.storage().del(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryAdapter;
    use crate::storage::StorageOptions;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn setup() -> (Arc<BaseStorage>, ReadThroughManager) {
        let storage = BaseStorage::new(
            Arc::new(MemoryAdapter::default()),
            StorageOptions::default(),
        );
        let manager = ReadThroughManager::new(storage.clone());
        (storage, manager)
    }

    fn counting_executor(counter: Arc<AtomicUsize>, value: Value) -> Executor {
        Box::new(move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(value))
            })
        })
    }

    #[tokio::test]
    async fn test_miss_loads_and_caches() {
        let (storage, manager) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let value = manager
            .get(
                "user:1",
                counting_executor(calls.clone(), json!("Alice")),
                ReadOptions::default().with_expires_in(60_000),
            )
            .await
            .unwrap();

        assert_eq!(value, json!("Alice"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(storage.get("user:1").await.unwrap().is_some());

        // Second read is a hit; the executor stays cold.
        let value = manager
            .get(
                "user:1",
                counting_executor(calls.clone(), json!("stale")),
                ReadOptions::default().with_expires_in(60_000),
            )
            .await
            .unwrap();
        assert_eq!(value, json!("Alice"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_time_expired_record_reloads() {
        let (_, manager) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        manager
            .set(
                "k",
                &json!("old"),
                WriteOptions::default().with_expires_in(20),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let value = manager
            .get(
                "k",
                counting_executor(calls.clone(), json!("new")),
                ReadOptions::default().with_expires_in(60_000),
            )
            .await
            .unwrap();

        assert_eq!(value, json!("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_touched_tag_invalidates() {
        let (storage, manager) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        manager
            .set(
                "k",
                &json!("v1"),
                WriteOptions::default()
                    .with_expires_in(60_000)
                    .with_tags(["sometag"]),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        storage.touch(&["sometag".into()]).await.unwrap();

        let value = manager
            .get(
                "k",
                counting_executor(calls.clone(), json!("v2")),
                ReadOptions::default()
                    .with_expires_in(60_000)
                    .with_tags(["sometag"]),
            )
            .await
            .unwrap();

        assert_eq!(value, json!("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_record_is_served_forever() {
        let (_, manager) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        manager
            .set("k", &json!("keep"), WriteOptions::default())
            .await
            .unwrap();

        let value = manager
            .get(
                "k",
                counting_executor(calls.clone(), json!("other")),
                ReadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(value, json!("keep"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
