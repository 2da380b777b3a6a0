use crate::error::SourceError;
use crate::types::{PermissionId, RoleId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Direct grants: permission to the roles allowed to exercise it.
///
/// Grants are not expanded through the role hierarchy.
pub type GrantMap = HashMap<PermissionId, HashSet<RoleId>>;

/// A role and its direct parents, as loaded from a [`RoleProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoleDefinition {
    /// Role identifier.
    pub id: RoleId,
    /// Direct parents; the role inherits everything granted to them.
    #[cfg_attr(feature = "serde", serde(default))]
    pub parents: Vec<RoleId>,
}

impl RoleDefinition {
    /// Creates a role definition.
    pub fn new(id: RoleId, parents: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            id,
            parents: parents.into_iter().collect(),
        }
    }
}

/// Source of role definitions.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Loads every role with its direct parents.
    async fn load_roles(&self) -> std::result::Result<Vec<RoleDefinition>, SourceError>;
}

/// Source of permission grants.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Stable provider name, used for diagnostics and cache keys.
    fn name(&self) -> &str;

    /// Loads the grants this provider contributes.
    async fn load_grants(&self) -> std::result::Result<GrantMap, SourceError>;
}

#[async_trait]
impl<T> RoleProvider for Arc<T>
where
    T: RoleProvider + ?Sized,
{
    async fn load_roles(&self) -> std::result::Result<Vec<RoleDefinition>, SourceError> {
        (**self).load_roles().await
    }
}

#[async_trait]
impl<T> PermissionProvider for Arc<T>
where
    T: PermissionProvider + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn load_grants(&self) -> std::result::Result<GrantMap, SourceError> {
        (**self).load_grants().await
    }
}
