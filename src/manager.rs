//! The cache-manager port and the single-flight machinery shared by every
//! manager.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::CacheError;
use crate::executor::{Executor, run_executor};
use crate::options::{ReadOptions, WriteOptions};
use crate::record::Record;
use crate::storage::BaseStorage;
use crate::strategies::run_executor::RunExecutorStrategy;
use crate::strategies::wait_for_result::WaitForResultStrategy;
use crate::strategy::{
    LockedKeyRetrieveContext, LockedKeyRetrieveStrategy, RUN_EXECUTOR_STRATEGY,
};

/// A cache manager applies one freshness policy on top of storage.
///
/// Managers are registered by name on the cache façade and selected per
/// call; they all share the single-flight machinery of [`BaseManager`].
#[async_trait]
pub trait CacheManager: Send + Sync {
    /// Name the manager is registered under.
    fn name(&self) -> &'static str;

    /// Return the freshest value the policy allows, running `executor`
    /// when the cache cannot serve the read.
    async fn get(
        &self,
        key: &str,
        executor: Executor,
        options: ReadOptions,
    ) -> Result<Value, CacheError>;

    /// Write a value through the manager's policy.
    async fn set(
        &self,
        key: &str,
        value: &Value,
        options: WriteOptions,
    ) -> Result<Record, CacheError>;

    /// Remove the record stored under `key`.
    async fn del(&self, key: &str) -> Result<bool, CacheError>;
}

/// Common machinery embedded by every manager: the storage handle and the
/// locked-key strategy registry.
pub(crate) struct BaseManager {
    storage: Arc<BaseStorage>,
    strategies: HashMap<String, Arc<dyn LockedKeyRetrieveStrategy>>,
}

impl BaseManager {
    /// Create the machinery with the two built-in strategies registered.
    pub fn new(storage: Arc<BaseStorage>) -> Self {
        let mut base = BaseManager {
            storage,
            strategies: HashMap::new(),
        };
        base.register_strategy(Arc::new(RunExecutorStrategy));
        base.register_strategy(Arc::new(WaitForResultStrategy::default()));
        base
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register_strategy(&mut self, strategy: Arc<dyn LockedKeyRetrieveStrategy>) {
        self.strategies
            .insert(strategy.name().to_string(), strategy);
    }

    pub fn storage(&self) -> &Arc<BaseStorage> {
        &self.storage
    }

    /// Single-flight update: acquire the key's lock, run the executor,
    /// write the result through the calling manager's `set`, and release
    /// the lock on every exit path.
    ///
    /// When the lock call itself fails the cache is bypassed entirely and
    /// the executor result is returned as-is. When the lock is held
    /// elsewhere the named locked-key strategy produces the value.
    pub async fn update_cache_and_get_result(
        &self,
        manager: &dyn CacheManager,
        key: &str,
        executor: Executor,
        options: ReadOptions,
    ) -> Result<Value, CacheError> {
        let locked = match self.storage.lock_key(key).await {
            Ok(locked) => locked,
            Err(err) => {
                warn!(key, error = %err, "lock acquisition failed, bypassing cache");
                return run_executor(executor).await;
            }
        };

        if !locked {
            let name = options
                .locked_key_retrieve_strategy
                .as_deref()
                .unwrap_or(RUN_EXECUTOR_STRATEGY);
            let strategy = self
                .strategies
                .get(name)
                .cloned()
                .ok_or_else(|| CacheError::UnknownStrategy(name.to_string()))?;
            return strategy
                .get(LockedKeyRetrieveContext {
                    key: key.to_string(),
                    executor,
                    storage: self.storage.clone(),
                })
                .await;
        }

        let result: Result<Value, CacheError> = async {
            let value = run_executor(executor).await?;
            manager.set(key, &value, options.into_write()).await?;
            Ok(value)
        }
        .await;

        if let Err(err) = self.storage.release_key(key).await {
            warn!(key, error = %err, "failed to release single-flight lock");
        }

        result
    }
}
