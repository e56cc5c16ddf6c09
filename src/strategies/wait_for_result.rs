use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::error;

use crate::error::CacheError;
use crate::serializer;
use crate::strategy::{
    LockedKeyRetrieveContext, LockedKeyRetrieveStrategy, WAIT_FOR_RESULT_STRATEGY,
};

/// Default total waiting budget, in milliseconds.
pub const DEFAULT_MAXIMUM_TIMEOUT_MS: u64 = 3_000;

/// Default polling cadence, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 250;

/// Wait for the lock holder to publish its result instead of hitting the
/// origin again.
///
/// Polls every `request_timeout_ms` until one of:
/// - the lock is released and a record with a value is present: decode and
///   return it;
/// - the lock is released but no usable record exists: fail with
///   [`CacheError::WaitForResult`]; the caller decides whether to retry;
/// - the total elapsed time exceeds `maximum_timeout_ms`: fail with
///   [`CacheError::RequestMaximumTimeoutExceeded`].
pub struct WaitForResultStrategy {
    maximum_timeout_ms: u64,
    request_timeout_ms: u64,
}

impl WaitForResultStrategy {
    /// Create a strategy with explicit timing.
    pub fn new(maximum_timeout_ms: u64, request_timeout_ms: u64) -> Self {
        WaitForResultStrategy {
            maximum_timeout_ms,
            request_timeout_ms,
        }
    }
}

impl Default for WaitForResultStrategy {
    fn default() -> Self {
        WaitForResultStrategy::new(DEFAULT_MAXIMUM_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS)
    }
}

#[async_trait]
impl LockedKeyRetrieveStrategy for WaitForResultStrategy {
    fn name(&self) -> &'static str {
        WAIT_FOR_RESULT_STRATEGY
    }

    async fn get(&self, context: LockedKeyRetrieveContext) -> Result<Value, CacheError> {
        let deadline = Instant::now() + Duration::from_millis(self.maximum_timeout_ms);

        loop {
            if Instant::now() >= deadline {
                error!(
                    key = %context.key,
                    timeout_ms = self.maximum_timeout_ms,
                    "gave up waiting for a locked key"
                );
                return Err(CacheError::RequestMaximumTimeoutExceeded(
                    self.maximum_timeout_ms,
                ));
            }

            tokio::time::sleep(Duration::from_millis(self.request_timeout_ms)).await;

            if context.storage.key_is_locked(&context.key).await? {
                continue;
            }

            let record = context.storage.get(&context.key).await?;
            return match record.and_then(|record| record.value) {
                Some(encoded) => serializer::decode::<Value>(&encoded),
                None => Err(CacheError::WaitForResult),
            };
        }
    }
}
