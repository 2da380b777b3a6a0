//! Static configuration for an [`AuthorizationService`].
//!
//! Every identifier is kept as a plain string while deserializing and
//! validated when the configuration is turned into a builder, so a bad
//! config fails with the same errors as the programmatic API.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheFailurePolicy;
use crate::error::{Error, Result};
use crate::guard::{Guard, GuardRule, PermissionGuard, ProtectionPolicy, RoleGuard, RoutePattern};
use crate::memory_cache::{DEFAULT_CAPACITY, MemoryCache};
use crate::memory_provider::{MemoryPermissionProvider, MemoryRoleProvider};
use crate::service::{AuthorizationService, AuthorizationServiceBuilder};
use crate::types::{PermissionId, RoleId};

/// Name of the permission provider built from the `grants` section.
pub const CONFIG_PROVIDER_NAME: &str = "config";

/// Roles, grants, guards and cache settings in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RbacConfig {
    /// Roles with their direct parents.
    pub roles: Vec<RoleConfig>,
    /// Permission to the roles granted it.
    pub grants: BTreeMap<String, Vec<String>>,
    /// Guards, evaluated in order.
    pub guards: Vec<GuardConfig>,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub id: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// Which kind of requirement a guard checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    Role,
    Permission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    pub name: String,
    pub kind: GuardKind,
    #[serde(default)]
    pub policy: ProtectionPolicy,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub pattern: String,
    pub required: Vec<String>,
}

/// Settings of the default in-process cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of cached snapshots; 0 disables caching.
    pub capacity: usize,
    /// Snapshot lifetime in seconds; unset keeps snapshots until invalidated.
    pub ttl_secs: Option<u64>,
    pub on_failure: CacheFailurePolicy,
    /// Prefix for every cache key.
    pub namespace: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_secs: None,
            on_failure: CacheFailurePolicy::default(),
            namespace: None,
        }
    }
}

impl RbacConfig {
    /// Validates every identifier and returns a builder backed by in-memory
    /// providers. More providers or assertions can be added afterwards.
    pub fn into_builder(self) -> Result<AuthorizationServiceBuilder<MemoryCache>> {
        let mut roles = MemoryRoleProvider::new();
        for role in &self.roles {
            let parents = role
                .parents
                .iter()
                .map(RoleId::new)
                .collect::<Result<Vec<_>>>()?;
            roles = roles.with_role(RoleId::new(&role.id)?, parents);
        }

        let mut grants = MemoryPermissionProvider::new(CONFIG_PROVIDER_NAME);
        for (permission, granted) in &self.grants {
            let permission = PermissionId::new(permission)?;
            for role in granted {
                grants = grants.with_grant(permission.clone(), RoleId::new(role)?);
            }
        }

        let mut builder = AuthorizationServiceBuilder::new()
            .role_provider(roles)
            .permission_provider(grants)
            .on_cache_failure(self.cache.on_failure);
        if let Some(secs) = self.cache.ttl_secs {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        if let Some(namespace) = self.cache.namespace {
            builder = builder.cache_namespace(namespace);
        }
        let mut builder = builder.cache(MemoryCache::new(self.cache.capacity));
        for guard in self.guards {
            builder = builder.guard(Guard::try_from(guard)?);
        }
        Ok(builder)
    }

    /// Shorthand for `into_builder()?.build()`.
    pub fn build(self) -> Result<AuthorizationService> {
        Ok(self.into_builder()?.build())
    }
}

impl TryFrom<GuardConfig> for Guard {
    type Error = Error;

    fn try_from(config: GuardConfig) -> Result<Self> {
        match config.kind {
            GuardKind::Role => {
                let mut guard = RoleGuard::new(config.name).policy(config.policy);
                for rule in config.rules {
                    guard = guard.rule(parse_rule(rule, |value| RoleId::new(value))?);
                }
                Ok(guard.into())
            }
            GuardKind::Permission => {
                let mut guard = PermissionGuard::new(config.name).policy(config.policy);
                for rule in config.rules {
                    guard = guard.rule(parse_rule(rule, |value| PermissionId::new(value))?);
                }
                Ok(guard.into())
            }
        }
    }
}

fn parse_rule<R>(rule: RuleConfig, parse: impl Fn(&str) -> Result<R>) -> Result<GuardRule<R>> {
    let pattern = RoutePattern::new(&rule.pattern)?;
    let required = rule
        .required
        .iter()
        .map(|value| parse(value))
        .collect::<Result<Vec<_>>>()?;
    GuardRule::new(pattern, required)
}
