use std::collections::HashSet;

use tracing::debug;

use crate::aggregate::PermissionAggregate;
use crate::assertion::{AssertionMap, Context};
use crate::cache::CacheBackend;
use crate::error::{Error, Result};
use crate::hierarchy::RoleHierarchy;
use crate::identity::Identity;
use crate::memory_cache::MemoryCache;
use crate::provider::GrantMap;
use crate::registry::RoleRegistry;
use crate::types::{PermissionId, RoleId};

/// Decides whether an identity is granted a permission.
///
/// Deny-by-default: an identity without roles, a role unknown to the
/// registry and a permission nobody was granted all resolve to `false`.
#[derive(Debug)]
pub struct Resolver<C = MemoryCache> {
    roles: RoleHierarchy<C>,
    permissions: PermissionAggregate<C>,
    assertions: AssertionMap,
}

impl<C: CacheBackend> Resolver<C> {
    /// Creates a resolver from its parts.
    pub fn new(
        roles: RoleHierarchy<C>,
        permissions: PermissionAggregate<C>,
        assertions: AssertionMap,
    ) -> Self {
        Self {
            roles,
            permissions,
            assertions,
        }
    }

    /// Role hierarchy backing this resolver.
    pub fn roles(&self) -> &RoleHierarchy<C> {
        &self.roles
    }

    /// Permission aggregate backing this resolver.
    pub fn permissions(&self) -> &PermissionAggregate<C> {
        &self.permissions
    }

    /// Held roles plus all of their ancestors.
    pub async fn effective_roles(&self, identity: &dyn Identity) -> Result<HashSet<RoleId>> {
        let registry = self.roles.registry().await?;
        effective_roles_in(&registry, identity)
    }

    /// Checks `permission` for `identity`, running the permission's
    /// assertion against `context` when one is registered.
    pub async fn is_granted(
        &self,
        identity: &dyn Identity,
        permission: &PermissionId,
        context: Option<Context<'_>>,
    ) -> Result<bool> {
        if identity.roles().is_empty() {
            debug!(%permission, "identity holds no roles");
            return Ok(false);
        }

        let grants = self.permissions.grants().await?;
        if !grants.contains_key(permission) {
            debug!(%permission, "permission is not granted to any role");
            return Ok(false);
        }

        let effective = self.effective_roles(identity).await?;
        if !has_grant(&grants, &effective, permission) {
            debug!(%permission, "no effective role grants permission");
            return Ok(false);
        }

        Ok(self.run_assertion(identity, permission, context))
    }

    fn run_assertion(
        &self,
        identity: &dyn Identity,
        permission: &PermissionId,
        context: Option<Context<'_>>,
    ) -> bool {
        match self.assertions.get(permission) {
            Some(assertion) => {
                let allowed = assertion.assert(identity, context);
                if !allowed {
                    debug!(%permission, "assertion vetoed grant");
                }
                allowed
            }
            None => true,
        }
    }
}

/// Structural check against an already loaded grant map; no assertion.
pub(crate) fn has_grant(
    grants: &GrantMap,
    effective: &HashSet<RoleId>,
    permission: &PermissionId,
) -> bool {
    grants
        .get(permission)
        .is_some_and(|granting| !granting.is_disjoint(effective))
}

pub(crate) fn effective_roles_in(
    registry: &RoleRegistry,
    identity: &dyn Identity,
) -> Result<HashSet<RoleId>> {
    let mut resolver = registry.resolver();
    let mut effective = HashSet::new();
    for role in identity.roles() {
        match resolver.resolve(role) {
            Ok(ancestors) => effective.extend(ancestors.iter().cloned()),
            Err(Error::UnknownRole(unknown)) if &unknown == role => {
                debug!(%role, "identity holds a role unknown to the registry");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(effective)
}
