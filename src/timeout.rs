//! Bounded-wait wrapper applied to every adapter call.

use std::future::Future;
use std::time::Duration;

use crate::error::CacheError;

/// Default per-call deadline for adapter operations, in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 150;

/// Run `operation` with a deadline of `timeout_ms` milliseconds.
///
/// Returns the operation's own outcome when it completes in time, and
/// [`CacheError::OperationTimeout`] otherwise. The caller is released
/// immediately on timeout; the in-flight transport work is only dropped,
/// never cancelled through the adapter (no cancellation channel is assumed
/// on the port).
pub async fn with_timeout<F, T>(operation: F, timeout_ms: u64) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), operation).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::OperationTimeout(timeout_ms)),
    }
}
