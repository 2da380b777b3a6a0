use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheBackend, CacheLayer};
use crate::error::{Error, Result};
use crate::memory_cache::MemoryCache;
use crate::provider::{GrantMap, PermissionProvider};
use crate::types::{PermissionId, RoleId};

const PERMISSIONS_CACHE_PREFIX: &str = "permissions:";

/// Union of several permission providers.
///
/// Grants are loaded lazily on first use and kept in the cache layer until
/// invalidated. A failing provider fails the whole load.
pub struct PermissionAggregate<C = MemoryCache> {
    providers: Vec<Arc<dyn PermissionProvider>>,
    cache: Arc<CacheLayer<C>>,
    cache_key: String,
}

impl<C> std::fmt::Debug for PermissionAggregate<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionAggregate")
            .field("providers", &self.providers.len())
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl PermissionAggregate<MemoryCache> {
    /// Creates an aggregate backed by a private in-process cache.
    pub fn new(providers: Vec<Arc<dyn PermissionProvider>>) -> Self {
        Self::with_cache(providers, Arc::new(CacheLayer::new(MemoryCache::default())))
    }
}

impl<C: CacheBackend> PermissionAggregate<C> {
    /// Creates an aggregate sharing the given cache layer.
    pub fn with_cache(providers: Vec<Arc<dyn PermissionProvider>>, cache: Arc<CacheLayer<C>>) -> Self {
        let cache_key = cache_key_for(&providers);
        Self {
            providers,
            cache,
            cache_key,
        }
    }

    /// Prefixes the cache key with `namespace`.
    ///
    /// The key is built from provider names, so aggregates sharing a backend
    /// must either use distinct provider names or distinct namespaces.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.cache_key = format!("{namespace}:{}", cache_key_for(&self.providers));
        self
    }

    /// Cache key of the merged grant map. Independent of provider order.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Loads every provider and merges the grants, bypassing the cache.
    pub async fn load_grants(&self) -> Result<GrantMap> {
        let mut merged = GrantMap::new();
        for provider in &self.providers {
            let grants = provider
                .load_grants()
                .await
                .map_err(|source| Error::ProviderLoad {
                    provider: provider.name().to_string(),
                    source,
                })?;
            debug!(
                provider = provider.name(),
                permissions = grants.len(),
                "permission provider loaded"
            );
            for (permission, roles) in grants {
                merged.entry(permission).or_default().extend(roles);
            }
        }
        info!(
            providers = self.providers.len(),
            permissions = merged.len(),
            "permission grants merged"
        );
        Ok(merged)
    }

    /// Returns the merged grant map, loading it on first use.
    pub async fn grants(&self) -> Result<Arc<GrantMap>> {
        self.cache
            .get_or_compute(&self.cache_key, || async {
                self.load_grants().await.map(Arc::new)
            })
            .await
    }

    /// Returns whether any role is granted `permission`.
    pub async fn has_permission(&self, permission: &PermissionId) -> Result<bool> {
        let grants = self.grants().await?;
        Ok(grants.get(permission).is_some_and(|roles| !roles.is_empty()))
    }

    /// Roles directly granted `permission`; empty for an unknown permission.
    pub async fn granting_roles(&self, permission: &PermissionId) -> Result<HashSet<RoleId>> {
        let grants = self.grants().await?;
        Ok(grants.get(permission).cloned().unwrap_or_default())
    }

    /// Drops the cached grant map; the next lookup reloads every provider.
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.invalidate(&self.cache_key).await
    }
}

fn cache_key_for(providers: &[Arc<dyn PermissionProvider>]) -> String {
    let mut names: Vec<&str> = providers.iter().map(|provider| provider.name()).collect();
    names.sort_unstable();
    format!("{PERMISSIONS_CACHE_PREFIX}{}", names.join("+"))
}
