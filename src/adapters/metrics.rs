//! Metrics middleware for storage adapters.
//!
//! This module provides a `MetricsAdapter` wrapper that emits metrics for
//! all adapter operations (reads, writes, removes, lock traffic) to a
//! user-provided sink.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagcache::{MemoryAdapter, MetricsAdapter, StorageAdapter};
//!
//! let sink = Arc::new(MySink::new());
//! let memory = Arc::new(MemoryAdapter::default());
//! let adapter: Arc<dyn StorageAdapter> = Arc::new(MetricsAdapter::new(memory, sink));
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::adapter::{AdapterOptions, AdapterResult, ConnectionStatus, StorageAdapter};
use crate::error::BoxError;

/// Metrics emitted by the MetricsAdapter wrapper.
#[derive(Debug, Clone)]
pub enum AdapterMetric {
    /// Emitted on every single-key read.
    Read {
        /// The storage key that was read.
        key: String,
        /// Whether the key was found.
        hit: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter (from `StorageAdapter::name()`).
        adapter: String,
    },
    /// Emitted on every single-key write.
    Write {
        /// The storage key that was written.
        key: String,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter.
        adapter: String,
    },
    /// Emitted on every remove.
    Remove {
        /// The storage key that was removed.
        key: String,
        /// Whether something was actually removed.
        removed: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter.
        adapter: String,
    },
    /// Emitted on every bulk read.
    BulkRead {
        /// Number of keys in the batch.
        key_count: usize,
        /// Number of keys that were found.
        hit_count: usize,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter.
        adapter: String,
    },
    /// Emitted on every bulk write.
    BulkWrite {
        /// Number of pairs in the batch.
        pair_count: usize,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter.
        adapter: String,
    },
    /// Emitted on every lock acquisition attempt.
    Lock {
        /// The logical key the lock guards.
        key: String,
        /// Whether the lock was acquired.
        acquired: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter.
        adapter: String,
    },
    /// Emitted on every lock release.
    Unlock {
        /// The logical key the lock guarded.
        key: String,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the wrapped adapter.
        adapter: String,
    },
}

/// Trait for receiving adapter metrics.
///
/// Implement this trait to collect metrics from `MetricsAdapter`.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Emit a single metric.
    ///
    /// This is called synchronously in the hot path of adapter operations.
    /// Implementations should be fast (e.g., buffer metrics in memory).
    fn emit(&self, metric: AdapterMetric);

    /// Flush buffered metrics to the backend.
    async fn flush(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Wrapper that emits a metric for every operation of an inner adapter.
///
/// Transparent to cache semantics; status and subscription pass straight
/// through.
pub struct MetricsAdapter {
    inner: Arc<dyn StorageAdapter>,
    sink: Arc<dyn MetricsSink>,
}

impl MetricsAdapter {
    /// Wrap `inner`, emitting metrics to `sink`.
    pub fn new(inner: Arc<dyn StorageAdapter>, sink: Arc<dyn MetricsSink>) -> Self {
        MetricsAdapter { inner, sink }
    }

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1000.0
    }
}

#[async_trait]
impl StorageAdapter for MetricsAdapter {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
        let start = Instant::now();
        let result = self.inner.get(key).await;

        if let Ok(ref value) = result {
            self.sink.emit(AdapterMetric::Read {
                key: key.to_string(),
                hit: value.is_some(),
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        expires_in_ms: Option<i64>,
    ) -> AdapterResult<bool> {
        let start = Instant::now();
        let result = self.inner.set(key, value, expires_in_ms).await;

        if result.is_ok() {
            self.sink.emit(AdapterMetric::Write {
                key: key.to_string(),
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn del(&self, key: &str) -> AdapterResult<bool> {
        let start = Instant::now();
        let result = self.inner.del(key).await;

        if let Ok(removed) = result {
            self.sink.emit(AdapterMetric::Remove {
                key: key.to_string(),
                removed,
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn mget(&self, keys: &[String]) -> AdapterResult<Vec<Option<String>>> {
        let start = Instant::now();
        let result = self.inner.mget(keys).await;

        if let Ok(ref values) = result {
            self.sink.emit(AdapterMetric::BulkRead {
                key_count: keys.len(),
                hit_count: values.iter().filter(|v| v.is_some()).count(),
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn mset(&self, pairs: &[(String, String)]) -> AdapterResult<()> {
        let start = Instant::now();
        let result = self.inner.mset(pairs).await;

        if result.is_ok() {
            self.sink.emit(AdapterMetric::BulkWrite {
                pair_count: pairs.len(),
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn acquire_lock(&self, key: &str, ttl_ms: Option<i64>) -> AdapterResult<bool> {
        let start = Instant::now();
        let result = self.inner.acquire_lock(key, ttl_ms).await;

        if let Ok(acquired) = result {
            self.sink.emit(AdapterMetric::Lock {
                key: key.to_string(),
                acquired,
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn release_lock(&self, key: &str) -> AdapterResult<bool> {
        let start = Instant::now();
        let result = self.inner.release_lock(key).await;

        if result.is_ok() {
            self.sink.emit(AdapterMetric::Unlock {
                key: key.to_string(),
                latency_ms: Self::elapsed_ms(start),
                adapter: self.inner.name().to_string(),
            });
        }
        result
    }

    async fn is_lock_exists(&self, key: &str) -> AdapterResult<bool> {
        self.inner.is_lock_exists(key).await
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.inner.connection_status()
    }

    fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.subscribe()
    }

    fn set_options(&self, options: AdapterOptions) {
        self.inner.set_options(options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryAdapter;
    use std::sync::Mutex;

    struct BufferedSink {
        buffer: Mutex<Vec<AdapterMetric>>,
    }

    impl BufferedSink {
        fn new() -> Self {
            BufferedSink {
                buffer: Mutex::new(Vec::new()),
            }
        }

        fn drain(&self) -> Vec<AdapterMetric> {
            self.buffer.lock().unwrap().drain(..).collect()
        }
    }

    #[async_trait]
    impl MetricsSink for BufferedSink {
        fn emit(&self, metric: AdapterMetric) {
            self.buffer.lock().unwrap().push(metric);
        }
    }

    #[tokio::test]
    async fn test_read_metrics_record_hits_and_misses() {
        let sink = Arc::new(BufferedSink::new());
        let adapter = MetricsAdapter::new(Arc::new(MemoryAdapter::default()), sink.clone());

        adapter.set("key1", "value1", None).await.unwrap();
        adapter.get("key1").await.unwrap();
        adapter.get("missing").await.unwrap();

        let metrics = sink.drain();
        assert_eq!(metrics.len(), 3);
        assert!(matches!(metrics[0], AdapterMetric::Write { .. }));
        assert!(matches!(metrics[1], AdapterMetric::Read { hit: true, .. }));
        assert!(matches!(metrics[2], AdapterMetric::Read { hit: false, .. }));
    }

    #[tokio::test]
    async fn test_lock_metrics_record_acquisition_outcome() {
        let sink = Arc::new(BufferedSink::new());
        let adapter = MetricsAdapter::new(Arc::new(MemoryAdapter::default()), sink.clone());

        adapter.acquire_lock("key1", Some(20_000)).await.unwrap();
        adapter.acquire_lock("key1", Some(20_000)).await.unwrap();
        adapter.release_lock("key1").await.unwrap();

        let metrics = sink.drain();
        assert!(matches!(
            metrics[0],
            AdapterMetric::Lock { acquired: true, .. }
        ));
        assert!(matches!(
            metrics[1],
            AdapterMetric::Lock {
                acquired: false,
                ..
            }
        ));
        assert!(matches!(metrics[2], AdapterMetric::Unlock { .. }));
    }

    #[tokio::test]
    async fn test_bulk_metrics_count_hits() {
        let sink = Arc::new(BufferedSink::new());
        let adapter = MetricsAdapter::new(Arc::new(MemoryAdapter::default()), sink.clone());

        adapter
            .mset(&[("a".into(), "1".into()), ("b".into(), "2".into())])
            .await
            .unwrap();
        adapter
            .mget(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();

        let metrics = sink.drain();
        assert!(matches!(
            metrics[0],
            AdapterMetric::BulkWrite { pair_count: 2, .. }
        ));
        assert!(matches!(
            metrics[1],
            AdapterMetric::BulkRead {
                key_count: 3,
                hit_count: 2,
                ..
            }
        ));
    }
}
