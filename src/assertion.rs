use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::identity::Identity;
use crate::types::PermissionId;

/// Opaque object a permission is checked against, e.g. the post being deleted.
pub type Context<'a> = &'a (dyn Any + Send + Sync);

/// Object-level check that can veto a role-based grant.
///
/// Assertions only run after the role check passed; returning `false` turns
/// the grant into a deny.
pub trait Assertion: Send + Sync {
    /// Returns whether `identity` may exercise the permission on `context`.
    fn assert(&self, identity: &dyn Identity, context: Option<Context<'_>>) -> bool;
}

impl<F> Assertion for F
where
    F: Fn(&dyn Identity, Option<Context<'_>>) -> bool + Send + Sync,
{
    fn assert(&self, identity: &dyn Identity, context: Option<Context<'_>>) -> bool {
        self(identity, context)
    }
}

/// Assertions keyed by the permission they guard.
#[derive(Clone, Default)]
pub struct AssertionMap {
    inner: HashMap<PermissionId, Arc<dyn Assertion>>,
}

impl std::fmt::Debug for AssertionMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.inner.keys()).finish()
    }
}

impl AssertionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an assertion, replacing any previous one for `permission`.
    pub fn insert(&mut self, permission: PermissionId, assertion: impl Assertion + 'static) {
        self.inner.insert(permission, Arc::new(assertion));
    }

    /// Assertion registered for `permission`, if any.
    pub fn get(&self, permission: &PermissionId) -> Option<&Arc<dyn Assertion>> {
        self.inner.get(permission)
    }

    /// Number of registered assertions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true when no assertion is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
