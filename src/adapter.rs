//! The port a backing store must satisfy.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::CacheError;

/// Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, CacheError>;

/// Current state of the adapter's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The transport is establishing a connection.
    Connecting,
    /// The transport is usable.
    Connected,
    /// The transport is down.
    Disconnected,
}

/// Adapter-level configuration passed down by the storage layer.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Per-call deadline hint, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        AdapterOptions {
            operation_timeout_ms: crate::timeout::DEFAULT_OPERATION_TIMEOUT_MS,
        }
    }
}

/// A storage adapter is the interface between the cache and a key-value
/// backing store.
///
/// Adapters deal exclusively in text payloads; record semantics live one
/// level up. TTLs are given in milliseconds and sub-second values must be
/// respected; adapters over seconds-granularity stores round up. Lock
/// operations act on `"{key}_lock"` and must be atomic set-if-absent in
/// the backing store.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// A name for logging/metrics.
    ///
    /// # Example
    /// - "memory"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Return the stored text for `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> AdapterResult<Option<String>>;

    /// Store `value` under `key` with an optional TTL in milliseconds.
    ///
    /// Returns whether the write was applied.
    async fn set(&self, key: &str, value: &str, expires_in_ms: Option<i64>)
    -> AdapterResult<bool>;

    /// Remove `key`; returns whether something was removed.
    async fn del(&self, key: &str) -> AdapterResult<bool>;

    /// Return stored texts aligned with `keys`; misses are `None`.
    async fn mget(&self, keys: &[String]) -> AdapterResult<Vec<Option<String>>>;

    /// Bulk store. Fails if `pairs` is empty.
    async fn mset(&self, pairs: &[(String, String)]) -> AdapterResult<()>;

    /// Atomic set-if-absent on `"{key}_lock"` with a TTL in milliseconds.
    ///
    /// Returns whether the lock was acquired.
    async fn acquire_lock(&self, key: &str, ttl_ms: Option<i64>) -> AdapterResult<bool>;

    /// Delete `"{key}_lock"`; returns whether it existed.
    async fn release_lock(&self, key: &str) -> AdapterResult<bool>;

    /// Whether `"{key}_lock"` currently exists.
    async fn is_lock_exists(&self, key: &str) -> AdapterResult<bool>;

    /// Current transport status.
    fn connection_status(&self) -> ConnectionStatus;

    /// Subscribe to transport status transitions.
    ///
    /// The storage layer watches this channel and drains its offline queue
    /// on every transition into [`ConnectionStatus::Connected`].
    fn subscribe(&self) -> watch::Receiver<ConnectionStatus>;

    /// Pass adapter-level configuration. Optional; defaults to a no-op.
    fn set_options(&self, _options: AdapterOptions) {}
}
