use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::lock::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::{Error, Result, SourceError};
use crate::provider::GrantMap;
use crate::registry::RoleRegistry;

/// Value stored in a cache backend.
///
/// With the `serde` feature both variants serialize, so out-of-process
/// backends can store them.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CacheValue {
    /// Loaded role registry snapshot.
    Roles(Arc<RoleRegistry>),
    /// Merged grant map snapshot.
    Grants(Arc<GrantMap>),
}

/// Types that can travel through a [`CacheBackend`].
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// Wraps the value for storage.
    fn into_value(self) -> CacheValue;

    /// Unwraps a stored value; `None` when the variant does not match.
    fn from_value(value: CacheValue) -> Option<Self>;
}

impl Cacheable for Arc<RoleRegistry> {
    fn into_value(self) -> CacheValue {
        CacheValue::Roles(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Roles(registry) => Some(registry),
            CacheValue::Grants(_) => None,
        }
    }
}

impl Cacheable for Arc<GrantMap> {
    fn into_value(self) -> CacheValue {
        CacheValue::Grants(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Grants(grants) => Some(grants),
            CacheValue::Roles(_) => None,
        }
    }
}

/// Cache backend interface.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Gets a cached value.
    async fn get(&self, key: &str) -> std::result::Result<Option<CacheValue>, SourceError>;

    /// Stores a value, optionally expiring after `ttl`.
    async fn set(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> std::result::Result<(), SourceError>;

    /// Removes a value.
    async fn clear(&self, key: &str) -> std::result::Result<(), SourceError>;
}

/// No-op cache implementation. Every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl CacheBackend for NoCache {
    async fn get(&self, _key: &str) -> std::result::Result<Option<CacheValue>, SourceError> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &str,
        _value: CacheValue,
        _ttl: Option<Duration>,
    ) -> std::result::Result<(), SourceError> {
        Ok(())
    }

    async fn clear(&self, _key: &str) -> std::result::Result<(), SourceError> {
        Ok(())
    }
}

/// What to do when the cache backend fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CacheFailurePolicy {
    /// Log and recompute from the providers.
    #[default]
    Bypass,
    /// Propagate [`Error::CacheUnavailable`].
    FailClosed,
}

/// Get-or-compute wrapper around a [`CacheBackend`].
///
/// Concurrent misses on one key run a single computation; the other callers
/// wait for it and read the stored result. Invalidation is wholesale.
pub struct CacheLayer<C> {
    backend: C,
    ttl: Option<Duration>,
    on_failure: CacheFailurePolicy,
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    written: Mutex<BTreeSet<String>>,
}

impl<C> std::fmt::Debug for CacheLayer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("ttl", &self.ttl)
            .field("on_failure", &self.on_failure)
            .finish_non_exhaustive()
    }
}

impl<C> CacheLayer<C> {
    /// Wraps a backend with no TTL and the bypass failure policy.
    pub fn new(backend: C) -> Self {
        Self {
            backend,
            ttl: None,
            on_failure: CacheFailurePolicy::default(),
            gates: Mutex::default(),
            written: Mutex::default(),
        }
    }

    /// Sets the TTL passed to the backend on every write.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the backend failure policy.
    pub fn on_failure(mut self, policy: CacheFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Returns the wrapped backend.
    pub fn backend(&self) -> &C {
        &self.backend
    }

    fn gate(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().expect("poisoned lock");
        Arc::clone(gates.entry(key.to_string()).or_default())
    }
}

impl<C: CacheBackend> CacheLayer<C> {
    /// Returns the cached value for `key`, computing and storing it on a miss.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.lookup::<T>(key).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(source) => {
                self.backend_failed(key, source)?;
                return compute().await;
            }
        }

        let gate = self.gate(key);
        let _held = gate.lock().await;

        // Another caller may have filled the key while we waited.
        match self.lookup::<T>(key).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(source) => {
                self.backend_failed(key, source)?;
                return compute().await;
            }
        }

        debug!(key, "cache miss, computing");
        let value = compute().await?;
        match self
            .backend
            .set(key, value.clone().into_value(), self.ttl)
            .await
        {
            Ok(()) => {
                self.written
                    .lock()
                    .expect("poisoned lock")
                    .insert(key.to_string());
            }
            Err(source) => self.backend_failed(key, source)?,
        }
        Ok(value)
    }

    /// Clears a single key, whether or not this layer wrote it.
    ///
    /// The key stays tracked until the backend confirms the clear, so a
    /// failed call can be retried.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.backend
            .clear(key)
            .await
            .map_err(|source| Error::CacheUnavailable {
                key: key.to_string(),
                source,
            })?;
        self.written.lock().expect("poisoned lock").remove(key);
        Ok(())
    }

    /// Clears every key written through this layer.
    ///
    /// Keys only read from a shared backend are not known here; callers
    /// that share a backend clear their keys with [`CacheLayer::invalidate`].
    pub async fn invalidate_all(&self) -> Result<()> {
        let keys: Vec<String> = self
            .written
            .lock()
            .expect("poisoned lock")
            .iter()
            .cloned()
            .collect();
        debug!(count = keys.len(), "invalidating cache");
        for key in keys {
            self.invalidate(&key).await?;
        }
        Ok(())
    }

    async fn lookup<T: Cacheable>(
        &self,
        key: &str,
    ) -> std::result::Result<Option<T>, SourceError> {
        Ok(self.backend.get(key).await?.and_then(T::from_value))
    }

    fn backend_failed(&self, key: &str, source: SourceError) -> Result<()> {
        match self.on_failure {
            CacheFailurePolicy::Bypass => {
                warn!(key, error = %source, "cache backend failed, bypassing cache");
                Ok(())
            }
            CacheFailurePolicy::FailClosed => Err(Error::CacheUnavailable {
                key: key.to_string(),
                source,
            }),
        }
    }
}
