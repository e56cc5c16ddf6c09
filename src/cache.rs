//! The cache façade: manager dispatch and the typed boundary.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::adapter::ConnectionStatus;
use crate::error::{BoxError, CacheError};
use crate::executor::Executor;
use crate::manager::CacheManager;
use crate::managers::refresh_ahead::REFRESH_AHEAD_MANAGER;
use crate::options::{ReadOptions, WriteOptions};
use crate::record::Record;
use crate::storage::BaseStorage;

/// Default record lifetime applied when the caller omits one: one day.
pub const DEFAULT_EXPIRES_IN_MS: i64 = 86_400_000;

/// High-level cache API dispatching to named managers.
///
/// Built through [`CacheBuilder`](crate::builder::CacheBuilder), which
/// registers the three built-in managers; more can be added with
/// [`Cache::register_manager`]. When the adapter is disconnected, `get`
/// short-circuits to the executor and never touches the cache.
pub struct Cache {
    storage: Arc<BaseStorage>,
    managers: RwLock<HashMap<String, Arc<dyn CacheManager>>>,
    expires_in: i64,
}

impl Cache {
    pub(crate) fn assemble(
        storage: Arc<BaseStorage>,
        expires_in: i64,
        managers: Vec<Arc<dyn CacheManager>>,
    ) -> Self {
        let managers = managers
            .into_iter()
            .map(|manager| (manager.name().to_string(), manager))
            .collect();
        Cache {
            storage,
            managers: RwLock::new(managers),
            expires_in,
        }
    }

    /// The shared storage underneath every manager.
    pub fn storage(&self) -> &Arc<BaseStorage> {
        &self.storage
    }

    /// Register a manager built from the shared storage.
    ///
    /// Duplicate names overwrite silently.
    pub fn register_manager<F>(&self, build: F)
    where
        F: FnOnce(Arc<BaseStorage>) -> Arc<dyn CacheManager>,
    {
        let manager = build(self.storage.clone());
        self.managers
            .write()
            .unwrap()
            .insert(manager.name().to_string(), manager);
    }

    fn manager(&self, name: &str) -> Result<Arc<dyn CacheManager>, CacheError> {
        self.managers
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownManager(name.to_string()))
    }

    /// Read through the selected manager (default: refresh-ahead).
    ///
    /// The executor receives the logical key and is consulted whenever the
    /// cache cannot serve the read; its result is written back with these
    /// options. When the adapter reports anything but
    /// [`ConnectionStatus::Connected`] the executor runs directly and the
    /// adapter receives no calls at all.
    pub async fn get<V, F, Fut>(
        &self,
        key: &str,
        executor: F,
        options: ReadOptions,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>, BoxError>> + Send + 'static,
    {
        if self.storage.connection_status() != ConnectionStatus::Connected {
            warn!(key, "adapter is not connected, calling executor directly");
            return match executor(key.to_string()).await {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(CacheError::ExecutorReturnsUndefined),
                Err(err) => Err(CacheError::Executor(err)),
            };
        }

        let manager = self.manager(
            options
                .manager
                .as_deref()
                .unwrap_or(REFRESH_AHEAD_MANAGER),
        )?;

        let mut options = options;
        options.expires_in.get_or_insert(self.expires_in);

        let value = manager
            .get(key, erase_executor(key, executor), options)
            .await?;
        serde_json::from_value(value).map_err(|err| CacheError::Parse(err.to_string()))
    }

    /// Write through the selected manager (default: refresh-ahead).
    pub async fn set<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        options: WriteOptions,
    ) -> Result<Record, CacheError> {
        let manager = self.manager(
            options
                .manager
                .as_deref()
                .unwrap_or(REFRESH_AHEAD_MANAGER),
        )?;

        let mut options = options;
        options.expires_in.get_or_insert(self.expires_in);

        let value =
            serde_json::to_value(value).map_err(|err| CacheError::Parse(err.to_string()))?;
        manager.set(key, &value, options).await
    }

    /// Advance tag versions, invalidating every record that carries an
    /// older version of any of them. Bypasses managers entirely.
    pub async fn touch(&self, tags: &[String]) -> Result<(), CacheError> {
        self.storage.touch(tags).await
    }

    /// Remove the record stored under `key`.
    pub async fn del(&self, key: &str) -> Result<bool, CacheError> {
        self.storage.del(key).await
    }
}

/// Erase a typed executor to the encoded-value level.
fn erase_executor<V, F, Fut>(key: &str, executor: F) -> Executor
where
    V: Serialize + Send + 'static,
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>, BoxError>> + Send + 'static,
{
    let key = key.to_string();
    Box::new(move || {
        Box::pin(async move {
            match executor(key).await? {
                Some(value) => {
                    let value = serde_json::to_value(&value)
                        .map_err(|err| Box::new(err) as BoxError)?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        })
    })
}
