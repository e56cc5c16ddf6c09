//! tagcache - a coordination-layer cache for Rust
//!
//! This library mediates between application code and a key-value backing
//! store, providing:
//! - Tag-based invalidation with versioned tags
//! - Pluggable freshness managers: read-through, refresh-ahead (default),
//!   write-through
//! - Single-flight loading arbitrated by distributed locks, with
//!   pluggable locked-key strategies
//! - An offline command queue that rides out transient disconnections
//! - Bounded latencies on every backend call
//!
//! The backing store is abstracted behind the [`StorageAdapter`] port; an
//! in-process [`MemoryAdapter`] ships with the crate.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagcache::{CacheBuilder, MemoryAdapter, ReadOptions, WriteOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = CacheBuilder::new(Arc::new(MemoryAdapter::default()))
//!         .with_prefix("cache")
//!         .with_expires_in(60_000)
//!         .build()?;
//!
//!     // Read-through with tag-based invalidation; the executor receives
//!     // the logical key.
//!     let user: String = cache
//!         .get(
//!             "user:123",
//!             |id| async move { Ok(Some(format!("User {id}"))) },
//!             ReadOptions::default().with_tags(["users"]),
//!         )
//!         .await?;
//!
//!     // Invalidate every record tagged "users".
//!     cache.touch(&["users".into()]).await?;
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod cache;
mod error;
mod executor;
mod manager;
mod options;
mod record;
mod storage;
mod strategy;
mod utils;

pub mod adapter;
pub mod adapters;
pub mod managers;
pub mod serializer;
pub mod strategies;
pub mod timeout;

// Re-export public API
pub use adapter::{AdapterOptions, AdapterResult, ConnectionStatus, StorageAdapter};
pub use adapters::memory::{EvictOnSetConfig, MemoryAdapter, MemoryAdapterConfig};
pub use adapters::metrics::{AdapterMetric, MetricsAdapter, MetricsSink};
pub use builder::CacheBuilder;
pub use cache::{Cache, DEFAULT_EXPIRES_IN_MS};
pub use error::{BoxError, CacheError};
pub use executor::{Executor, ExecutorResult};
pub use manager::CacheManager;
pub use managers::read_through::{READ_THROUGH_MANAGER, ReadThroughManager};
pub use managers::refresh_ahead::{
    DEFAULT_REFRESH_AHEAD_FACTOR, REFRESH_AHEAD_MANAGER, RefreshAheadManager,
};
pub use managers::write_through::{WRITE_THROUGH_MANAGER, WriteThroughManager};
pub use options::{GetTagsFn, ReadOptions, Tags, WriteOptions};
pub use record::{Record, Tag};
pub use storage::{
    BaseStorage, DEFAULT_LOCK_EXPIRE_TIMEOUT_MS, StorageOptions, TAGS_VERSIONS_ALIAS,
};
pub use strategy::{
    LockedKeyRetrieveContext, LockedKeyRetrieveStrategy, RUN_EXECUTOR_STRATEGY,
    WAIT_FOR_RESULT_STRATEGY,
};
pub use strategies::run_executor::RunExecutorStrategy;
pub use strategies::wait_for_result::{
    DEFAULT_MAXIMUM_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS, WaitForResultStrategy,
};
pub use timeout::{DEFAULT_OPERATION_TIMEOUT_MS, with_timeout};
