use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::CacheError;
use crate::executor::{Executor, run_executor};
use crate::manager::{BaseManager, CacheManager};
use crate::options::{ReadOptions, WriteOptions};
use crate::record::Record;
use crate::serializer;
use crate::storage::BaseStorage;
use crate::strategy::LockedKeyRetrieveStrategy;
use crate::utils::now_ms;

/// Name the refresh-ahead manager is registered under. This is the cache
/// façade's default manager.
pub const REFRESH_AHEAD_MANAGER: &str = "refresh-ahead";

/// Default fraction of a record's lifetime after which a hit triggers an
/// asynchronous refresh.
pub const DEFAULT_REFRESH_AHEAD_FACTOR: f64 = 0.8;

/// Read-through semantics plus early background refreshing.
///
/// A valid hit whose age has crossed `expires_in * factor` is returned to
/// the caller immediately while a refresh task re-runs the executor and
/// rewrites the record. Refreshes are deduplicated through an auxiliary
/// lock in the backing store and their failures never reach the
/// originating caller.
pub struct RefreshAheadManager {
    base: BaseManager,
    refresh_ahead_factor: f64,
}

impl RefreshAheadManager {
    /// Create a manager with the default refresh-ahead factor.
    pub fn new(storage: Arc<BaseStorage>) -> Self {
        RefreshAheadManager {
            base: BaseManager::new(storage),
            refresh_ahead_factor: DEFAULT_REFRESH_AHEAD_FACTOR,
        }
    }

    /// Create a manager with an explicit refresh-ahead factor.
    ///
    /// Finite factors outside `(0, 1)` are rejected.
    pub fn with_factor(storage: Arc<BaseStorage>, factor: f64) -> Result<Self, CacheError> {
        if factor.is_finite() && (factor <= 0.0 || factor >= 1.0) {
            return Err(CacheError::InvalidRefreshAheadFactor(factor));
        }
        Ok(RefreshAheadManager {
            base: BaseManager::new(storage),
            refresh_ahead_factor: factor,
        })
    }

    /// Register an additional locked-key strategy.
    pub fn register_strategy(&mut self, strategy: Arc<dyn LockedKeyRetrieveStrategy>) {
        self.base.register_strategy(strategy);
    }

    fn is_expiring_soon(&self, record: &Record, now: i64) -> bool {
        !record.permanent
            && now
                > record.created_at
                    + (record.expires_in as f64 * self.refresh_ahead_factor) as i64
    }

    /// Fire-and-forget refresh, deduplicated through the auxiliary
    /// `refreshAhead:` lock. Failures are logged and swallowed.
    fn spawn_refresh(&self, key: &str, executor: Executor, options: WriteOptions) {
        let storage = self.base.storage().clone();
        let key = key.to_string();
        let refresh_key = format!("refreshAhead:{key}");

        tokio::spawn(async move {
            match storage.lock_key(&refresh_key).await {
                Ok(true) => {
                    let result: Result<(), CacheError> = async {
                        let value = run_executor(executor).await?;
                        storage.set(&key, &value, &options).await?;
                        Ok(())
                    }
                    .await;

                    if let Err(err) = result {
                        error!(key = %key, error = %err, "background refresh failed");
                    }
                    if let Err(err) = storage.release_key(&refresh_key).await {
                        warn!(key = %key, error = %err, "failed to release refresh lock");
                    }
                }
                // Another refresher is in flight.
                Ok(false) => {}
                Err(err) => warn!(key = %key, error = %err, "could not acquire refresh lock"),
            }
        });
    }
}

#[async_trait]
impl CacheManager for RefreshAheadManager {
    fn name(&self) -> &'static str {
        REFRESH_AHEAD_MANAGER
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
            && record.value.is_some()
            && !record.is_expired(now_ms())
            && !self.base.storage().is_outdated(record).await
            && let Some(ref encoded) = record.value
        {
            match serializer::decode::<Value>(encoded) {
                Ok(value) => {
                    if self.is_expiring_soon(record, now_ms()) {
                        self.spawn_refresh(key, executor, options.into_write());
                    }
                    return Ok(value);
                }
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
