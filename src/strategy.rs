//! Behavior when another worker holds the single-flight lock for a key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;
use crate::executor::Executor;
use crate::storage::BaseStorage;

/// Name of the default strategy: run the executor locally.
pub const RUN_EXECUTOR_STRATEGY: &str = "runExecutor";

/// Name of the polling strategy: wait for the lock holder's result.
pub const WAIT_FOR_RESULT_STRATEGY: &str = "waitForResult";

/// Everything a strategy may need to produce the caller's value.
pub struct LockedKeyRetrieveContext {
    /// Logical key whose lock is held elsewhere.
    pub key: String,
    /// The caller's executor, consumable at most once.
    pub executor: Executor,
    /// Storage handle for polling the lock and the record.
    pub storage: Arc<BaseStorage>,
}

/// A locked-key retrieve strategy answers: what should a `get` caller do
/// when it could not acquire the single-flight lock for a key?
///
/// Strategies are registered under a stable string name and selected per
/// call through `ReadOptions::locked_key_retrieve_strategy`.
#[async_trait]
pub trait LockedKeyRetrieveStrategy: Send + Sync {
    /// Stable name the strategy is registered under.
    fn name(&self) -> &'static str;

    /// Produce the caller's value.
    async fn get(&self, context: LockedKeyRetrieveContext) -> Result<Value, CacheError>;
}
