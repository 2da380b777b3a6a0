use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::provider::{GrantMap, PermissionProvider, RoleDefinition, RoleProvider};
use crate::types::{PermissionId, RoleId};

/// In-memory role provider for static configuration, tests and demos.
///
/// Clones share state, so a test can keep a handle and change roles after
/// the provider was handed to a service.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoleProvider {
    roles: Arc<RwLock<Vec<RoleDefinition>>>,
}

impl MemoryRoleProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a role with its direct parents.
    pub fn add_role(&self, id: RoleId, parents: impl IntoIterator<Item = RoleId>) {
        let mut guard = self.roles.write().expect("poisoned lock");
        guard.push(RoleDefinition::new(id, parents));
    }

    /// Builder-style variant of [`MemoryRoleProvider::add_role`].
    pub fn with_role(self, id: RoleId, parents: impl IntoIterator<Item = RoleId>) -> Self {
        self.add_role(id, parents);
        self
    }
}

impl From<Vec<RoleDefinition>> for MemoryRoleProvider {
    fn from(roles: Vec<RoleDefinition>) -> Self {
        Self {
            roles: Arc::new(RwLock::new(roles)),
        }
    }
}

#[async_trait]
impl RoleProvider for MemoryRoleProvider {
    async fn load_roles(&self) -> std::result::Result<Vec<RoleDefinition>, crate::SourceError> {
        let guard = self.roles.read().expect("poisoned lock");
        Ok(guard.clone())
    }
}

/// In-memory permission provider.
#[derive(Debug, Clone)]
pub struct MemoryPermissionProvider {
    name: String,
    grants: Arc<RwLock<GrantMap>>,
}

impl MemoryPermissionProvider {
    /// Creates an empty provider with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grants: Arc::default(),
        }
    }

    /// Grants a permission to a role.
    pub fn grant(&self, permission: PermissionId, role: RoleId) {
        let mut guard = self.grants.write().expect("poisoned lock");
        guard.entry(permission).or_default().insert(role);
    }

    /// Builder-style variant of [`MemoryPermissionProvider::grant`].
    pub fn with_grant(self, permission: PermissionId, role: RoleId) -> Self {
        self.grant(permission, role);
        self
    }

    /// Removes every grant of a permission.
    pub fn revoke_all(&self, permission: &PermissionId) {
        let mut guard = self.grants.write().expect("poisoned lock");
        guard.remove(permission);
    }
}

#[async_trait]
impl PermissionProvider for MemoryPermissionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_grants(&self) -> std::result::Result<GrantMap, crate::SourceError> {
        let guard = self.grants.read().expect("poisoned lock");
        Ok(guard.clone())
    }
}
