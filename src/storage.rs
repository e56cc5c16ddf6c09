//! Record and tag semantics over a storage adapter.
//!
//! `BaseStorage` owns everything between cache managers and the raw
//! key-value port: the key-naming policy (prefixing, optional MD5
//! hashing), the record envelope, tag versioning, single-flight lock
//! delegation, and the offline command queue that rides out transient
//! disconnections.

use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, Weak};

use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{AdapterOptions, ConnectionStatus, StorageAdapter};
use crate::error::CacheError;
use crate::options::WriteOptions;
use crate::record::{Record, Tag};
use crate::serializer;
use crate::timeout::{DEFAULT_OPERATION_TIMEOUT_MS, with_timeout};
use crate::utils::{now_ms, uniq};

/// Logical prefix under which tag versions are stored. Runs through the
/// same naming policy as record keys.
pub const TAGS_VERSIONS_ALIAS: &str = "cache-tags-versions:";

/// Default TTL for single-flight locks, in milliseconds. Bounds the damage
/// of a crashed lock holder.
pub const DEFAULT_LOCK_EXPIRE_TIMEOUT_MS: i64 = 20_000;

/// A deferred adapter command held in the offline queue.
///
/// Commands capture their arguments at submission time and can be invoked
/// again on every drain cycle until one attempt succeeds.
type CachedCommand = Arc<dyn Fn() -> BoxFuture<'static, Result<(), CacheError>> + Send + Sync>;

/// Configuration for BaseStorage.
pub struct StorageOptions {
    /// Prefix joined to every logical key with `-`; empty disables
    /// prefixing.
    pub prefix: String,

    /// Store MD5 hex digests instead of readable keys. One-way; there is
    /// no de-hash path.
    pub hash_keys: bool,

    /// Separate adapter for tag versions. When set, the primary adapter
    /// never sees tag traffic, so it may evict freely while tag versions
    /// stay authoritative.
    pub tags_adapter: Option<Arc<dyn StorageAdapter>>,

    /// Per-call deadline for adapter operations, in milliseconds.
    pub operation_timeout_ms: u64,

    /// TTL applied to every acquired lock, in milliseconds.
    pub lock_expire_timeout_ms: i64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        StorageOptions {
            prefix: String::new(),
            hash_keys: false,
            tags_adapter: None,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            lock_expire_timeout_ms: DEFAULT_LOCK_EXPIRE_TIMEOUT_MS,
        }
    }
}

/// Translates record and tag semantics to adapter calls.
///
/// Every adapter call is wrapped with the configured operation timeout, so
/// callers are released within a bounded wait even when the transport
/// hangs. Constructed through [`BaseStorage::new`], which also spawns the
/// listener that drains the offline queue on reconnect.
pub struct BaseStorage {
    adapter: Arc<dyn StorageAdapter>,
    tags_adapter: Option<Arc<dyn StorageAdapter>>,
    prefix: String,
    hash_keys: bool,
    operation_timeout_ms: u64,
    lock_expire_timeout_ms: i64,
    commands_queue: Mutex<Vec<CachedCommand>>,
}

impl BaseStorage {
    /// Create a new storage over `adapter`.
    ///
    /// Spawns a background listener that watches the adapter's connection
    /// status and drains the offline queue on every transition into
    /// [`ConnectionStatus::Connected`]. The listener holds only a weak
    /// handle, so dropping the last `Arc` shuts it down.
    pub fn new(adapter: Arc<dyn StorageAdapter>, options: StorageOptions) -> Arc<Self> {
        adapter.set_options(AdapterOptions {
            operation_timeout_ms: options.operation_timeout_ms,
        });

        let storage = Arc::new(BaseStorage {
            adapter,
            tags_adapter: options.tags_adapter,
            prefix: options.prefix,
            hash_keys: options.hash_keys,
            operation_timeout_ms: options.operation_timeout_ms,
            lock_expire_timeout_ms: options.lock_expire_timeout_ms,
            commands_queue: Mutex::new(Vec::new()),
        });
        storage.spawn_connect_listener();
        storage
    }

    fn spawn_connect_listener(self: &Arc<Self>) {
        let weak: Weak<BaseStorage> = Arc::downgrade(self);
        let mut status_rx = self.adapter.subscribe();

        tokio::spawn(async move {
            while status_rx.changed().await.is_ok() {
                if *status_rx.borrow_and_update() != ConnectionStatus::Connected {
                    continue;
                }
                let Some(storage) = weak.upgrade() else {
                    break;
                };
                storage.drain_queue().await;
            }
        });
    }

    /// The storage-visible key for a logical key: `"{prefix}-{key}"` when
    /// a prefix is configured, then optionally MD5-hexed.
    pub fn effective_key(&self, key: &str) -> String {
        let prefixed = if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}-{}", self.prefix, key)
        };

        if self.hash_keys {
            format!("{:x}", md5::compute(prefixed))
        } else {
            prefixed
        }
    }

    /// The storage-visible key holding a tag's current version.
    pub fn tag_version_key(&self, tag_name: &str) -> String {
        self.effective_key(&format!("{TAGS_VERSIONS_ALIAS}{tag_name}"))
    }

    /// Current transport status of the primary adapter.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.adapter.connection_status()
    }

    /// Number of commands waiting for the adapter to reconnect.
    pub fn queue_len(&self) -> usize {
        self.commands_queue.lock().unwrap().len()
    }

    fn tags_adapter(&self) -> Arc<dyn StorageAdapter> {
        self.tags_adapter
            .as_ref()
            .unwrap_or(&self.adapter)
            .clone()
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        with_timeout(operation, self.operation_timeout_ms).await
    }

    /// Read the record stored under `key`.
    ///
    /// Payloads that do not decode to a well-formed record envelope are
    /// treated as misses, never as errors; a poisoned entry must not
    /// poison reads.
    pub async fn get(&self, key: &str) -> Result<Option<Record>, CacheError> {
        let effective_key = self.effective_key(key);
        let Some(payload) = self.bounded(self.adapter.get(&effective_key)).await? else {
            return Ok(None);
        };

        match serializer::decode::<Record>(&payload) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(key, error = %err, "stored payload is not a record, treating as a miss");
                Ok(None)
            }
        }
    }

    /// Encode `value` into a record and write it through the adapter.
    ///
    /// The record's tag list is the duplicate-free, order-preserving union
    /// of `options.tags` and `options.get_tags(value)`; each tag is
    /// stamped with the current wall-clock version. The record's
    /// `expires_in` doubles as the adapter TTL; `0` writes without a time
    /// bound.
    pub async fn set(
        &self,
        key: &str,
        value: &Value,
        options: &WriteOptions,
    ) -> Result<Record, CacheError> {
        let mut tag_names = options
            .tags
            .as_ref()
            .map(|tags| tags.resolve())
            .unwrap_or_default();
        if let Some(ref get_tags) = options.get_tags {
            tag_names.extend(get_tags(value));
        }
        let tags = uniq(tag_names).into_iter().map(Tag::new).collect();

        let encoded_value = serializer::encode(value)?;
        let expires_in = options.expires_in.unwrap_or(0);
        let record = Record::new(key, Some(encoded_value), tags, expires_in);

        let payload = serializer::encode(&record)?;
        let ttl = (expires_in > 0).then_some(expires_in);
        self.bounded(
            self.adapter
                .set(&self.effective_key(key), &payload, ttl),
        )
        .await?;

        Ok(record)
    }

    /// Remove the record stored under `key`.
    pub async fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.bounded(self.adapter.del(&self.effective_key(key))).await
    }

    /// Advance the versions of `tags` to the current wall clock.
    ///
    /// An empty list is a no-op. The write is submitted as a cached
    /// command: while the adapter is disconnected (or the write times
    /// out) it parks in the offline queue and replays on reconnect.
    pub async fn touch(&self, tags: &[String]) -> Result<(), CacheError> {
        if tags.is_empty() {
            return Ok(());
        }

        let version = now_ms().to_string();
        let pairs: Vec<(String, String)> = tags
            .iter()
            .map(|tag| (self.tag_version_key(tag), version.clone()))
            .collect();

        let adapter = self.tags_adapter();
        let timeout_ms = self.operation_timeout_ms;
        let command: CachedCommand = Arc::new(move || {
            let adapter = adapter.clone();
            let pairs = pairs.clone();
            Box::pin(async move { with_timeout(adapter.mset(&pairs), timeout_ms).await })
        });

        self.cached_command(command).await
    }

    /// Current versions of `names`, aligned with the input; tags absent
    /// from storage read as version 0. Empty input makes no backend call.
    pub async fn get_tags(&self, names: &[String]) -> Result<Vec<Tag>, CacheError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = names
            .iter()
            .map(|name| self.tag_version_key(name))
            .collect();
        let versions = self.bounded(self.tags_adapter().mget(&keys)).await?;

        Ok(names
            .iter()
            .zip(versions)
            .map(|(name, version)| Tag {
                name: name.clone(),
                version: version.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0),
            })
            .collect())
    }

    /// Whether any of the record's tags has advanced past its recorded
    /// version.
    ///
    /// When versions cannot be verified the record is reported outdated:
    /// stale data must never be served silently.
    pub async fn is_outdated(&self, record: &Record) -> bool {
        if record.tags.is_empty() {
            return false;
        }

        let names = record.tag_names();
        match self.get_tags(&names).await {
            Ok(stored) => record
                .tags
                .iter()
                .zip(stored)
                .any(|(recorded, current)| current.version > recorded.version),
            Err(err) => {
                warn!(
                    key = %record.key,
                    error = %err,
                    "tag version check failed, treating record as outdated"
                );
                true
            }
        }
    }

    /// Acquire the single-flight lock for `key`. Returns whether this
    /// caller holds it. The lock always carries the configured TTL.
    pub async fn lock_key(&self, key: &str) -> Result<bool, CacheError> {
        self.bounded(
            self.adapter
                .acquire_lock(&self.effective_key(key), Some(self.lock_expire_timeout_ms)),
        )
        .await
    }

    /// Release the single-flight lock for `key`.
    pub async fn release_key(&self, key: &str) -> Result<bool, CacheError> {
        self.bounded(self.adapter.release_lock(&self.effective_key(key)))
            .await
    }

    /// Whether the single-flight lock for `key` is currently held.
    pub async fn key_is_locked(&self, key: &str) -> Result<bool, CacheError> {
        self.bounded(self.adapter.is_lock_exists(&self.effective_key(key)))
            .await
    }

    async fn cached_command(&self, command: CachedCommand) -> Result<(), CacheError> {
        if self.adapter.connection_status() != ConnectionStatus::Connected {
            self.enqueue(command);
            return Ok(());
        }

        match command().await {
            Err(err) if err.is_timeout() => {
                warn!(error = %err, "command timed out, queueing for replay on reconnect");
                self.enqueue(command);
                Ok(())
            }
            other => other,
        }
    }

    fn enqueue(&self, command: CachedCommand) {
        self.commands_queue.lock().unwrap().push(command);
    }

    /// Replay every queued command once, keeping the ones that fail.
    ///
    /// Failed commands are re-queued ahead of anything appended while the
    /// drain was in flight.
    pub(crate) async fn drain_queue(&self) {
        let snapshot: Vec<CachedCommand> = {
            let mut queue = self.commands_queue.lock().unwrap();
            mem::take(&mut *queue)
        };
        if snapshot.is_empty() {
            return;
        }

        debug!(commands = snapshot.len(), "draining offline command queue");
        let results = join_all(snapshot.iter().map(|command| command())).await;

        let mut requeued: Vec<CachedCommand> = Vec::new();
        for (command, result) in snapshot.into_iter().zip(results) {
            if let Err(err) = result {
                warn!(error = %err, "queued command failed, keeping it for the next drain");
                requeued.push(command);
            }
        }

        if !requeued.is_empty() {
            let mut queue = self.commands_queue.lock().unwrap();
            requeued.extend(queue.drain(..));
            *queue = requeued;
        }
    }
}
