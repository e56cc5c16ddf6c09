use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;
use crate::executor::run_executor;
use crate::strategy::{LockedKeyRetrieveContext, LockedKeyRetrieveStrategy, RUN_EXECUTOR_STRATEGY};

/// The default locked-key strategy: invoke the caller's executor and
/// return its result.
///
/// No backoff, no cache interaction. The lock holder and this caller may
/// hit the origin concurrently; callers that cannot afford that select
/// `waitForResult` instead.
pub struct RunExecutorStrategy;

#[async_trait]
impl LockedKeyRetrieveStrategy for RunExecutorStrategy {
    fn name(&self) -> &'static str {
        RUN_EXECUTOR_STRATEGY
    }

    async fn get(&self, context: LockedKeyRetrieveContext) -> Result<Value, CacheError> {
        run_executor(context.executor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryAdapter;
    use crate::storage::{BaseStorage, StorageOptions};
    use serde_json::json;
    use std::sync::Arc;

    fn context(executor: crate::executor::Executor) -> LockedKeyRetrieveContext {
        let storage = BaseStorage::new(
            Arc::new(MemoryAdapter::default()),
            StorageOptions::default(),
        );
        LockedKeyRetrieveContext {
            key: "key1".into(),
            executor,
            storage,
        }
    }

    #[tokio::test]
    async fn test_runs_executor_and_returns_its_value() {
        let executor: crate::executor::Executor =
            Box::new(|| Box::pin(async { Ok(Some(json!("loaded"))) }));

        let result = RunExecutorStrategy.get(context(executor)).await.unwrap();
        assert_eq!(result, json!("loaded"));
    }

    #[tokio::test]
    async fn test_absent_executor_value_bubbles() {
        let executor: crate::executor::Executor = Box::new(|| Box::pin(async { Ok(None) }));

        let result = RunExecutorStrategy.get(context(executor)).await;
        assert!(matches!(result, Err(CacheError::ExecutorReturnsUndefined)));
    }
}
