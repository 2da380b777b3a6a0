use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::aggregate::PermissionAggregate;
use crate::assertion::{Assertion, AssertionMap, Context};
use crate::cache::{CacheBackend, CacheFailurePolicy, CacheLayer};
use crate::error::Result;
use crate::guard::{Guard, GuardVerdict};
use crate::hierarchy::RoleHierarchy;
use crate::identity::Identity;
use crate::memory_cache::MemoryCache;
use crate::memory_provider::MemoryRoleProvider;
use crate::provider::{PermissionProvider, RoleProvider};
use crate::resolver::{Resolver, effective_roles_in, has_grant};
use crate::types::{PermissionId, RoleId};

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

impl From<bool> for Decision {
    fn from(granted: bool) -> Self {
        if granted { Self::Allow } else { Self::Deny }
    }
}

/// Entry point for route guards and permission checks.
#[derive(Debug)]
pub struct AuthorizationService<C = MemoryCache> {
    resolver: Resolver<C>,
    guards: Vec<Guard>,
}

/// Builder for [`AuthorizationService`].
pub struct AuthorizationServiceBuilder<C = MemoryCache> {
    role_provider: Option<Arc<dyn RoleProvider>>,
    permission_providers: Vec<Arc<dyn PermissionProvider>>,
    cache: C,
    cache_ttl: Option<Duration>,
    on_cache_failure: CacheFailurePolicy,
    cache_namespace: Option<String>,
    guards: Vec<Guard>,
    assertions: AssertionMap,
}

impl AuthorizationServiceBuilder<MemoryCache> {
    /// Creates a builder with an in-process cache and no providers.
    pub fn new() -> Self {
        Self {
            role_provider: None,
            permission_providers: Vec::new(),
            cache: MemoryCache::default(),
            cache_ttl: None,
            on_cache_failure: CacheFailurePolicy::default(),
            cache_namespace: None,
            guards: Vec::new(),
            assertions: AssertionMap::new(),
        }
    }
}

impl Default for AuthorizationServiceBuilder<MemoryCache> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> AuthorizationServiceBuilder<C> {
    /// Sets the role provider. Without one the service knows no roles.
    pub fn role_provider(mut self, provider: impl RoleProvider + 'static) -> Self {
        self.role_provider = Some(Arc::new(provider));
        self
    }

    /// Adds a permission provider. Grants from all providers are unioned.
    pub fn permission_provider(mut self, provider: impl PermissionProvider + 'static) -> Self {
        self.permission_providers.push(Arc::new(provider));
        self
    }

    /// Sets the TTL of cached role and permission snapshots.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the behavior on cache backend failures.
    pub fn on_cache_failure(mut self, policy: CacheFailurePolicy) -> Self {
        self.on_cache_failure = policy;
        self
    }

    /// Prefixes every cache key with `namespace`.
    ///
    /// Needed when services with different providers of the same name share
    /// one cache backend; otherwise they read each other's snapshots.
    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = Some(namespace.into());
        self
    }

    /// Appends a guard. Guards are evaluated in the order they are added.
    pub fn guard(mut self, guard: impl Into<Guard>) -> Self {
        self.guards.push(guard.into());
        self
    }

    /// Registers an assertion for a permission.
    pub fn assertion(
        mut self,
        permission: PermissionId,
        assertion: impl Assertion + 'static,
    ) -> Self {
        self.assertions.insert(permission, assertion);
        self
    }

    /// Sets the cache backend.
    pub fn cache<C2: CacheBackend>(self, cache: C2) -> AuthorizationServiceBuilder<C2> {
        AuthorizationServiceBuilder {
            role_provider: self.role_provider,
            permission_providers: self.permission_providers,
            cache,
            cache_ttl: self.cache_ttl,
            on_cache_failure: self.on_cache_failure,
            cache_namespace: self.cache_namespace,
            guards: self.guards,
            assertions: self.assertions,
        }
    }
}

impl<C: CacheBackend> AuthorizationServiceBuilder<C> {
    /// Builds the service. Nothing is loaded until the first check.
    pub fn build(self) -> AuthorizationService<C> {
        let cache = Arc::new(
            CacheLayer::new(self.cache)
                .with_ttl(self.cache_ttl)
                .on_failure(self.on_cache_failure),
        );
        let role_provider: Arc<dyn RoleProvider> = match self.role_provider {
            Some(provider) => provider,
            None => Arc::new(MemoryRoleProvider::new()),
        };
        let mut roles = RoleHierarchy::with_cache(role_provider, Arc::clone(&cache));
        let mut permissions = PermissionAggregate::with_cache(self.permission_providers, cache);
        if let Some(namespace) = &self.cache_namespace {
            roles = roles.with_namespace(namespace);
            permissions = permissions.with_namespace(namespace);
        }

        AuthorizationService {
            resolver: Resolver::new(roles, permissions, self.assertions),
            guards: self.guards,
        }
    }
}

impl AuthorizationService<MemoryCache> {
    /// Shorthand for [`AuthorizationServiceBuilder::new`].
    pub fn builder() -> AuthorizationServiceBuilder<MemoryCache> {
        AuthorizationServiceBuilder::new()
    }
}

impl<C: CacheBackend> AuthorizationService<C> {
    /// Returns whether `identity` is granted `permission`.
    pub async fn is_granted(
        &self,
        identity: &dyn Identity,
        permission: &PermissionId,
    ) -> Result<bool> {
        self.resolver.is_granted(identity, permission, None).await
    }

    /// Returns whether `identity` is granted `permission` on `context`.
    pub async fn is_granted_on(
        &self,
        identity: &dyn Identity,
        permission: &PermissionId,
        context: Context<'_>,
    ) -> Result<bool> {
        self.resolver
            .is_granted(identity, permission, Some(context))
            .await
    }

    /// Same as [`AuthorizationService::is_granted`] with an optional
    /// context, returning a [`Decision`].
    pub async fn authorize(
        &self,
        identity: &dyn Identity,
        permission: &PermissionId,
        context: Option<Context<'_>>,
    ) -> Result<Decision> {
        self.resolver
            .is_granted(identity, permission, context)
            .await
            .map(Decision::from)
    }

    /// Runs every configured guard against `route`. Any deny denies.
    pub async fn check_route(&self, identity: &dyn Identity, route: &str) -> Result<GuardVerdict> {
        if self.guards.is_empty() {
            return Ok(GuardVerdict::Allow);
        }

        let registry = self.resolver.roles().registry().await?;
        let effective = effective_roles_in(&registry, identity)?;
        let needs_grants = self
            .guards
            .iter()
            .any(|guard| matches!(guard, Guard::Permission(_)));
        let grants = if needs_grants {
            Some(self.resolver.permissions().grants().await?)
        } else {
            None
        };

        for guard in &self.guards {
            let verdict = match guard {
                Guard::Role(guard) => guard.evaluate(route, &effective),
                Guard::Permission(guard) => guard.evaluate(route, |permission| {
                    grants
                        .as_deref()
                        .is_some_and(|grants| has_grant(grants, &effective, permission))
                }),
            };
            if let GuardVerdict::Deny { guard, rule } = &verdict {
                debug!(route, guard, rule = rule.as_deref(), "guard denied route");
                return Ok(verdict);
            }
        }
        Ok(GuardVerdict::Allow)
    }

    /// Held roles plus all of their ancestors.
    pub async fn effective_roles(&self, identity: &dyn Identity) -> Result<HashSet<RoleId>> {
        self.resolver.effective_roles(identity).await
    }

    /// Configured guards, in evaluation order.
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// Resolver used for permission checks.
    pub fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }

    /// Drops the cached role and permission snapshots; the next check
    /// reloads from the providers.
    ///
    /// Both keys are cleared by name, so snapshots written by another
    /// service sharing the backend are dropped too.
    pub async fn invalidate(&self) -> Result<()> {
        info!(
            permissions = self.resolver.permissions().cache_key(),
            "invalidating authorization caches"
        );
        self.resolver.roles().invalidate().await?;
        self.resolver.permissions().invalidate().await
    }
}
