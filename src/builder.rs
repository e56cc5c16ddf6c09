//! Builder API for assembling a cache over a storage adapter.

use std::sync::Arc;

use crate::adapter::StorageAdapter;
use crate::cache::{Cache, DEFAULT_EXPIRES_IN_MS};
use crate::error::CacheError;
use crate::manager::CacheManager;
use crate::managers::read_through::ReadThroughManager;
use crate::managers::refresh_ahead::{DEFAULT_REFRESH_AHEAD_FACTOR, RefreshAheadManager};
use crate::managers::write_through::WriteThroughManager;
use crate::storage::{
    BaseStorage, DEFAULT_LOCK_EXPIRE_TIMEOUT_MS, StorageOptions,
};
use crate::strategy::LockedKeyRetrieveStrategy;
use crate::timeout::DEFAULT_OPERATION_TIMEOUT_MS;

enum StorageSource {
    Adapter(Arc<dyn StorageAdapter>),
    Prebuilt(Arc<BaseStorage>),
}

/// Builder for [`Cache`].
///
/// Starts either from a raw adapter, which gets wrapped in
/// [`BaseStorage`] using the configured naming policy, or from a
/// pre-built storage. `build` registers the three built-in managers
/// (`read-through`, `refresh-ahead`, `write-through`) and validates the
/// refresh-ahead factor.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tagcache::{CacheBuilder, MemoryAdapter};
///
/// let cache = CacheBuilder::new(Arc::new(MemoryAdapter::default()))
///     .with_prefix("cache")
///     .hash_keys(true)
///     .with_expires_in(60_000)
///     .build()?;
/// ```
pub struct CacheBuilder {
    source: StorageSource,
    tags_adapter: Option<Arc<dyn StorageAdapter>>,
    prefix: String,
    hash_keys: bool,
    expires_in: i64,
    operation_timeout_ms: u64,
    lock_expire_timeout_ms: i64,
    refresh_ahead_factor: f64,
    strategies: Vec<Arc<dyn LockedKeyRetrieveStrategy>>,
}

impl CacheBuilder {
    /// Start from a storage adapter.
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        CacheBuilder {
            source: StorageSource::Adapter(adapter),
            tags_adapter: None,
            prefix: String::new(),
            hash_keys: false,
            expires_in: DEFAULT_EXPIRES_IN_MS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            lock_expire_timeout_ms: DEFAULT_LOCK_EXPIRE_TIMEOUT_MS,
            refresh_ahead_factor: DEFAULT_REFRESH_AHEAD_FACTOR,
            strategies: Vec::new(),
        }
    }

    /// Start from a pre-built storage.
    ///
    /// Naming and timeout knobs are already fixed by the storage and are
    /// ignored on this path.
    pub fn from_storage(storage: Arc<BaseStorage>) -> Self {
        CacheBuilder {
            source: StorageSource::Prebuilt(storage),
            tags_adapter: None,
            prefix: String::new(),
            hash_keys: false,
            expires_in: DEFAULT_EXPIRES_IN_MS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            lock_expire_timeout_ms: DEFAULT_LOCK_EXPIRE_TIMEOUT_MS,
            refresh_ahead_factor: DEFAULT_REFRESH_AHEAD_FACTOR,
            strategies: Vec::new(),
        }
    }

    /// Prefix joined to every logical key.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Store MD5 digests instead of readable keys.
    pub fn hash_keys(mut self, hash_keys: bool) -> Self {
        self.hash_keys = hash_keys;
        self
    }

    /// Keep tag versions on a separate adapter, shielding them from the
    /// primary store's eviction.
    pub fn with_tags_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.tags_adapter = Some(adapter);
        self
    }

    /// Default record lifetime in milliseconds.
    pub fn with_expires_in(mut self, expires_in_ms: i64) -> Self {
        self.expires_in = expires_in_ms;
        self
    }

    /// Per-call adapter deadline in milliseconds.
    pub fn with_operation_timeout(mut self, timeout_ms: u64) -> Self {
        self.operation_timeout_ms = timeout_ms;
        self
    }

    /// TTL applied to single-flight locks, in milliseconds.
    pub fn with_lock_expire_timeout(mut self, timeout_ms: i64) -> Self {
        self.lock_expire_timeout_ms = timeout_ms;
        self
    }

    /// Fraction of a record's lifetime after which a refresh-ahead hit
    /// triggers a background refresh.
    pub fn with_refresh_ahead_factor(mut self, factor: f64) -> Self {
        self.refresh_ahead_factor = factor;
        self
    }

    /// Register an additional locked-key strategy on every built-in
    /// manager.
    pub fn add_locked_key_retrieve_strategy(
        mut self,
        strategy: Arc<dyn LockedKeyRetrieveStrategy>,
    ) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Assemble the cache.
    pub fn build(self) -> Result<Cache, CacheError> {
        let storage = match self.source {
            StorageSource::Prebuilt(storage) => storage,
            StorageSource::Adapter(adapter) => BaseStorage::new(
                adapter,
                StorageOptions {
                    prefix: self.prefix,
                    hash_keys: self.hash_keys,
                    tags_adapter: self.tags_adapter,
                    operation_timeout_ms: self.operation_timeout_ms,
                    lock_expire_timeout_ms: self.lock_expire_timeout_ms,
                },
            ),
        };

        let mut read_through = ReadThroughManager::new(storage.clone());
        let mut refresh_ahead =
            RefreshAheadManager::with_factor(storage.clone(), self.refresh_ahead_factor)?;
        let mut write_through = WriteThroughManager::new(storage.clone());

        for strategy in self.strategies {
            read_through.register_strategy(strategy.clone());
            refresh_ahead.register_strategy(strategy.clone());
            write_through.register_strategy(strategy);
        }

        let managers: Vec<Arc<dyn CacheManager>> = vec![
            Arc::new(read_through),
            Arc::new(refresh_ahead),
            Arc::new(write_through),
        ];

        Ok(Cache::assemble(storage, self.expires_in, managers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryAdapter;
    use crate::options::ReadOptions;

    #[tokio::test]
    async fn test_build_registers_all_three_managers() {
        let cache = CacheBuilder::new(Arc::new(MemoryAdapter::default()))
            .build()
            .unwrap();

        for manager in ["read-through", "refresh-ahead", "write-through"] {
            let value: i64 = cache
                .get(
                    "k",
                    |_key| async move { Ok(Some(1)) },
                    ReadOptions::default().with_manager(manager),
                )
                .await
                .unwrap();
            assert_eq!(value, 1);
        }
    }

    #[tokio::test]
    async fn test_invalid_refresh_ahead_factor_fails_build() {
        let result = CacheBuilder::new(Arc::new(MemoryAdapter::default()))
            .with_refresh_ahead_factor(1.5)
            .build();
        assert!(matches!(
            result,
            Err(CacheError::InvalidRefreshAheadFactor(_))
        ));
    }

    #[tokio::test]
    async fn test_prefix_and_hashing_flow_into_storage() {
        let adapter = Arc::new(MemoryAdapter::default());
        let cache = CacheBuilder::new(adapter.clone())
            .with_prefix("cache")
            .build()
            .unwrap();

        assert_eq!(cache.storage().effective_key("test"), "cache-test");

        let hashed = CacheBuilder::new(adapter).hash_keys(true).build().unwrap();
        assert_eq!(
            hashed.storage().effective_key("test"),
            "098f6bcd4621d373cade4e832627b4f6"
        );
    }

    #[tokio::test]
    async fn test_from_storage_reuses_the_given_storage() {
        let storage = BaseStorage::new(
            Arc::new(MemoryAdapter::default()),
            StorageOptions {
                prefix: "pre".into(),
                ..Default::default()
            },
        );
        let cache = CacheBuilder::from_storage(storage.clone()).build().unwrap();
        assert!(Arc::ptr_eq(cache.storage(), &storage));
    }
}
