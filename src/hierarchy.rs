use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheBackend, CacheLayer};
use crate::error::{Error, Result};
use crate::memory_cache::MemoryCache;
use crate::provider::RoleProvider;
use crate::registry::RoleRegistry;
use crate::types::RoleId;

/// Cache key of the role registry snapshot.
pub const ROLES_CACHE_KEY: &str = "roles";

/// Loads [`RoleRegistry`] snapshots from a [`RoleProvider`] through the cache.
pub struct RoleHierarchy<C = MemoryCache> {
    provider: Arc<dyn RoleProvider>,
    cache: Arc<CacheLayer<C>>,
    cache_key: String,
}

impl<C> std::fmt::Debug for RoleHierarchy<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleHierarchy")
            .field("cache_key", &self.cache_key)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RoleHierarchy<MemoryCache> {
    /// Creates a hierarchy backed by a private in-process cache.
    pub fn new(provider: impl RoleProvider + 'static) -> Self {
        Self::with_cache(
            Arc::new(provider),
            Arc::new(CacheLayer::new(MemoryCache::default())),
        )
    }
}

impl<C: CacheBackend> RoleHierarchy<C> {
    /// Creates a hierarchy sharing the given cache layer.
    pub fn with_cache(provider: Arc<dyn RoleProvider>, cache: Arc<CacheLayer<C>>) -> Self {
        Self {
            provider,
            cache,
            cache_key: ROLES_CACHE_KEY.to_string(),
        }
    }

    /// Prefixes the cache key with `namespace`, so hierarchies over
    /// different providers can share one backend.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.cache_key = format!("{namespace}:{ROLES_CACHE_KEY}");
        self
    }

    /// Cache key of the registry snapshot.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Loads and validates a fresh registry, bypassing the cache.
    pub async fn load_registry(&self) -> Result<RoleRegistry> {
        let definitions = self.provider.load_roles().await.map_err(Error::RoleLoad)?;
        let registry = RoleRegistry::from_definitions(definitions)?;
        info!(roles = registry.len(), "role registry loaded");
        Ok(registry)
    }

    /// Returns the current registry snapshot, loading it on first use.
    pub async fn registry(&self) -> Result<Arc<RoleRegistry>> {
        self.cache
            .get_or_compute(&self.cache_key, || async {
                self.load_registry().await.map(Arc::new)
            })
            .await
    }

    /// Resolves `role` and its ancestors against the current snapshot.
    pub async fn resolve_ancestors(&self, role: &RoleId) -> Result<HashSet<RoleId>> {
        self.registry().await?.resolve_ancestors(role)
    }

    /// Drops the cached snapshot; the next lookup reloads it.
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.invalidate(&self.cache_key).await
    }
}
