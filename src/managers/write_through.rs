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

/// Name the write-through manager is registered under.
pub const WRITE_THROUGH_MANAGER: &str = "write-through";

/// Cache entries that are only ever changed through the cache itself.
///
/// Reads ignore time and tags entirely: a present record with a value is
/// served. Writes force permanence, so the backing store's clock never
/// invalidates an entry; explicit `set`/`del` are the only mutation
/// channels.
pub struct WriteThroughManager {
    base: BaseManager,
}

impl WriteThroughManager {
    /// Create a manager over `storage`.
    pub fn new(storage: Arc<BaseStorage>) -> Self {
        WriteThroughManager {
            base: BaseManager::new(storage),
        }
    }

    /// Register an additional locked-key strategy.
    pub fn register_strategy(&mut self, strategy: Arc<dyn LockedKeyRetrieveStrategy>) {
        self.base.register_strategy(strategy);
    }
}

#[async_trait]
impl CacheManager for WriteThroughManager {
    fn name(&self) -> &'static str {
        WRITE_THROUGH_MANAGER
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

    /// Write the value as a permanent record, regardless of the caller's
    /// `expires_in`.
    async fn set(
        &self,
        key: &str,
        value: &Value,
        options: WriteOptions,
    ) -> Result<Record, CacheError> {
        let mut options = options;
        options.expires_in = Some(0);
        self.base.storage().set(key, value, &options).await
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.base.storage().del(key).await
    }
}
