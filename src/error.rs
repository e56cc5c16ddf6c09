/// Boxed error type carried through executor results.
///
/// Executors belong to the caller; whatever they fail with is preserved
/// as-is and surfaced through [`CacheError::Executor`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An adapter call did not complete within the configured timeout.
    ///
    /// The waiter is released; the underlying transport call is not
    /// cancelled.
    #[error("operation timed out after {0} ms")]
    OperationTimeout(u64),

    /// Deserializing a record or its value failed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A storage adapter operation failed.
    #[error("[{adapter}] storage error for key '{key}': {message}")]
    Adapter {
        adapter: String,
        key: String,
        message: String,
    },

    /// The single-flight lock was released but no record was found.
    ///
    /// Raised by the `waitForResult` locked-key strategy; the caller
    /// decides whether to retry.
    #[error("lock was released but no result is available")]
    WaitForResult,

    /// The `waitForResult` strategy exceeded its total waiting budget.
    #[error("request maximum timeout of {0} ms exceeded")]
    RequestMaximumTimeoutExceeded(u64),

    /// The executor resolved without producing a value.
    #[error("executor returned no value")]
    ExecutorReturnsUndefined,

    /// The caller's executor failed.
    #[error("executor failed: {0}")]
    Executor(#[source] BoxError),

    /// No manager is registered under the requested name.
    #[error("unknown manager '{0}'")]
    UnknownManager(String),

    /// No locked-key retrieve strategy is registered under the requested
    /// name.
    #[error("unknown locked key retrieve strategy '{0}'")]
    UnknownStrategy(String),

    /// The refresh-ahead factor must lie strictly between 0 and 1.
    #[error("invalid refresh ahead factor {0}; expected a value in (0, 1)")]
    InvalidRefreshAheadFactor(f64),
}

impl CacheError {
    /// Create a new adapter error.
    pub fn adapter(
        adapter: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Adapter {
            adapter: adapter.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error is an [`CacheError::OperationTimeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, CacheError::OperationTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_format() {
        let err = CacheError::adapter("memory", "user:1", "boom");
        assert_eq!(
            err.to_string(),
            "[memory] storage error for key 'user:1': boom"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(CacheError::OperationTimeout(150).is_timeout());
        assert!(!CacheError::WaitForResult.is_timeout());
    }
}
