//! Type-erased executors.
//!
//! The caller's loader function is generic at the façade boundary and
//! erased to the encoded-value level (`serde_json::Value`) before it
//! travels through managers and locked-key strategies, so those stay
//! object-safe and registrable by name.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{BoxError, CacheError};

/// Outcome of an executor: a value, an explicit absence, or the caller's
/// own error.
pub type ExecutorResult<V = Value> = Result<Option<V>, BoxError>;

/// An erased executor, consumed at most once per cache call.
pub type Executor = Box<dyn FnOnce() -> BoxFuture<'static, ExecutorResult> + Send>;

/// Run an executor and enforce its contract: resolving without a value is
/// a programming error.
pub(crate) async fn run_executor(executor: Executor) -> Result<Value, CacheError> {
    match executor().await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(CacheError::ExecutorReturnsUndefined),
        Err(err) => Err(CacheError::Executor(err)),
    }
}
