use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use crate::adapter::{AdapterResult, ConnectionStatus, StorageAdapter};
use crate::error::CacheError;
use crate::utils::{now_ms, rand_simple};

/// Configuration for eviction on set operations.
#[derive(Debug, Clone)]
pub struct EvictOnSetConfig {
    /// Provide a number between 0 and 1 to calculate whether eviction should run on each set.
    ///
    /// - `1.0` -> run eviction on every `set`
    /// - `0.5` -> run eviction on every 2nd `set` (on average)
    /// - `0.0` -> disable eviction
    pub frequency: f64,

    /// Remove items until the number of items in the map is lower than `max_items`.
    pub max_items: usize,
}

/// Configuration for MemoryAdapter.
#[derive(Debug, Clone)]
pub struct MemoryAdapterConfig {
    /// Remove expired entries on every `set` operation.
    pub evict_on_set: Option<EvictOnSetConfig>,

    /// Transport status the adapter reports at construction.
    pub initial_status: ConnectionStatus,
}

impl Default for MemoryAdapterConfig {
    fn default() -> Self {
        MemoryAdapterConfig {
            evict_on_set: None,
            initial_status: ConnectionStatus::Connected,
        }
    }
}

struct StoredValue {
    value: String,
    /// Wall-clock milliseconds after which the entry is gone; `None` means
    /// no time bound.
    expires_at: Option<i64>,
}

impl StoredValue {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Thread-safe in-memory storage adapter using HashMap with RwLock.
///
/// This is a simple, dependency-free adapter suitable for:
/// - Embedded caches without an external backing store
/// - Tests that need to drive connection transitions and observe keys
///
/// Per-entry TTLs are honored at millisecond granularity and enforced
/// lazily on read. Locks are plain keys with the `_lock` suffix, inserted
/// only when absent, so acquisition is atomic under the map's write lock.
///
/// The connection status is fully driveable through [`MemoryAdapter::connect`],
/// [`MemoryAdapter::disconnect`] and [`MemoryAdapter::set_status`], which is
/// what makes this adapter double as the offline-queue test harness.
pub struct MemoryAdapter {
    state: RwLock<HashMap<String, StoredValue>>,
    evict_on_set: Option<EvictOnSetConfig>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl MemoryAdapter {
    /// Create a new MemoryAdapter with the given configuration.
    pub fn new(config: MemoryAdapterConfig) -> Self {
        let (status_tx, _) = watch::channel(config.initial_status);
        MemoryAdapter {
            state: RwLock::new(HashMap::new()),
            evict_on_set: config.evict_on_set,
            status_tx,
        }
    }

    /// Report the transport as connected, waking status subscribers.
    pub fn connect(&self) {
        self.set_status(ConnectionStatus::Connected);
    }

    /// Report the transport as disconnected.
    pub fn disconnect(&self) {
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Set the reported transport status.
    pub fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    /// Number of live (non-expired) entries, locks included.
    pub async fn len(&self) -> usize {
        let now = now_ms();
        let state = self.state.read().await;
        state.values().filter(|v| !v.is_expired(now)).count()
    }

    fn lock_name(key: &str) -> String {
        format!("{key}_lock")
    }

    /// Run eviction if configured and random check passes.
    async fn maybe_evict(&self) {
        let Some(ref config) = self.evict_on_set else {
            return;
        };

        if config.frequency <= 0.0 {
            return;
        }

        let should_evict = if config.frequency >= 1.0 {
            true
        } else {
            rand_simple() < config.frequency
        };

        if !should_evict {
            return;
        }

        let mut state = self.state.write().await;
        let now = now_ms();

        // First delete all expired entries
        state.retain(|_, v| !v.is_expired(now));

        // If still over max_items, remove entries closest to expiry
        if state.len() > config.max_items {
            let mut entries: Vec<_> = state
                .iter()
                .map(|(k, v)| (k.clone(), v.expires_at.unwrap_or(i64::MAX)))
                .collect();
            entries.sort_by_key(|(_, expires)| *expires);

            let to_remove = state.len() - config.max_items;
            for (key, _) in entries.into_iter().take(to_remove) {
                state.remove(&key);
            }
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        MemoryAdapter::new(MemoryAdapterConfig::default())
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
        let state = self.state.read().await;

        let Some(stored) = state.get(key) else {
            return Ok(None);
        };

        if stored.is_expired(now_ms()) {
            drop(state);
            let mut state = self.state.write().await;
            state.remove(key);
            return Ok(None);
        }

        Ok(Some(stored.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        expires_in_ms: Option<i64>,
    ) -> AdapterResult<bool> {
        let expires_at = expires_in_ms.map(|ttl| now_ms() + ttl);

        {
            let mut state = self.state.write().await;
            state.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    expires_at,
                },
            );
        }

        self.maybe_evict().await;
        Ok(true)
    }

    async fn del(&self, key: &str) -> AdapterResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.remove(key).is_some())
    }

    async fn mget(&self, keys: &[String]) -> AdapterResult<Vec<Option<String>>> {
        let now = now_ms();
        let state = self.state.read().await;
        Ok(keys
            .iter()
            .map(|key| {
                state
                    .get(key)
                    .filter(|stored| !stored.is_expired(now))
                    .map(|stored| stored.value.clone())
            })
            .collect())
    }

    async fn mset(&self, pairs: &[(String, String)]) -> AdapterResult<()> {
        if pairs.is_empty() {
            return Err(CacheError::adapter(
                self.name(),
                "",
                "mset requires at least one key-value pair",
            ));
        }

        let mut state = self.state.write().await;
        for (key, value) in pairs {
            state.insert(
                key.clone(),
                StoredValue {
                    value: value.clone(),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn acquire_lock(&self, key: &str, ttl_ms: Option<i64>) -> AdapterResult<bool> {
        let lock_key = Self::lock_name(key);
        let now = now_ms();
        let mut state = self.state.write().await;

        if state.get(&lock_key).is_some_and(|held| !held.is_expired(now)) {
            return Ok(false);
        }

        state.insert(
            lock_key,
            StoredValue {
                value: String::new(),
                expires_at: ttl_ms.map(|ttl| now + ttl),
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str) -> AdapterResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.remove(&Self::lock_name(key)).is_some())
    }

    async fn is_lock_exists(&self, key: &str) -> AdapterResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .get(&Self::lock_name(key))
            .is_some_and(|held| !held.is_expired(now_ms())))
    }

    fn connection_status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_set_del() {
        let adapter = MemoryAdapter::default();

        assert!(adapter.get("key1").await.unwrap().is_none());

        assert!(adapter.set("key1", "value1", None).await.unwrap());
        assert_eq!(
            adapter.get("key1").await.unwrap(),
            Some("value1".to_string())
        );

        assert!(adapter.del("key1").await.unwrap());
        assert!(!adapter.del("key1").await.unwrap());
        assert!(adapter.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sub_second_ttl_is_respected() {
        let adapter = MemoryAdapter::default();
        adapter.set("key1", "value1", Some(30)).await.unwrap();

        assert!(adapter.get("key1").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(adapter.get("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mget_aligns_with_input() {
        let adapter = MemoryAdapter::default();
        adapter.set("a", "1", None).await.unwrap();
        adapter.set("c", "3", None).await.unwrap();

        let result = adapter
            .mget(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(
            result,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mset_rejects_empty_input() {
        let adapter = MemoryAdapter::default();
        assert!(adapter.mset(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_lock_is_set_if_absent() {
        let adapter = MemoryAdapter::default();

        assert!(adapter.acquire_lock("key1", Some(20_000)).await.unwrap());
        assert!(!adapter.acquire_lock("key1", Some(20_000)).await.unwrap());
        assert!(adapter.is_lock_exists("key1").await.unwrap());

        assert!(adapter.release_lock("key1").await.unwrap());
        assert!(!adapter.is_lock_exists("key1").await.unwrap());
        assert!(adapter.acquire_lock("key1", Some(20_000)).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_reacquired() {
        let adapter = MemoryAdapter::default();

        assert!(adapter.acquire_lock("key1", Some(20)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!adapter.is_lock_exists("key1").await.unwrap());
        assert!(adapter.acquire_lock("key1", Some(20)).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_transitions_are_observable() {
        let adapter = MemoryAdapter::new(MemoryAdapterConfig {
            initial_status: ConnectionStatus::Disconnected,
            ..Default::default()
        });
        assert_eq!(adapter.connection_status(), ConnectionStatus::Disconnected);

        let mut rx = adapter.subscribe();
        adapter.connect();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);
        assert_eq!(adapter.connection_status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_evict_on_set_caps_entries() {
        let adapter = MemoryAdapter::new(MemoryAdapterConfig {
            evict_on_set: Some(EvictOnSetConfig {
                frequency: 1.0,
                max_items: 2,
            }),
            ..Default::default()
        });

        adapter.set("a", "1", Some(10_000)).await.unwrap();
        adapter.set("b", "2", Some(20_000)).await.unwrap();
        adapter.set("c", "3", Some(30_000)).await.unwrap();

        assert!(adapter.len().await <= 2);
        // The entry furthest from expiry survives.
        assert_eq!(adapter.get("c").await.unwrap(), Some("3".to_string()));
    }
}
