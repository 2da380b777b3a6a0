use crate::error::{Error, Result};
use crate::provider::RoleDefinition;
use crate::types::RoleId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Role graph with parent edges.
///
/// Parents may be registered after their children, but the graph is kept
/// acyclic at every registration. Once shared behind an `Arc` the registry is
/// treated as an immutable snapshot.
///
/// With the `serde` feature the registry serializes as its role definitions
/// in registration order, and deserializing re-runs every check
/// [`RoleRegistry::from_definitions`] does.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(into = "Vec<RoleDefinition>", try_from = "Vec<RoleDefinition>")
)]
pub struct RoleRegistry {
    parents: HashMap<RoleId, Vec<RoleId>>,
    order: Vec<RoleId>,
}

impl RoleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from definitions and validates that every parent
    /// is registered.
    pub fn from_definitions(definitions: impl IntoIterator<Item = RoleDefinition>) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register_role(definition.id, definition.parents)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Registers a role with its direct parents.
    pub fn register_role(
        &mut self,
        id: RoleId,
        parents: impl IntoIterator<Item = RoleId>,
    ) -> Result<()> {
        if self.parents.contains_key(&id) {
            return Err(Error::DuplicateRole(id));
        }

        let mut unique = Vec::new();
        for parent in parents {
            if parent == id {
                return Err(Error::RoleCycle {
                    role: id,
                    parent,
                });
            }
            if !unique.contains(&parent) {
                unique.push(parent);
            }
        }

        // A child registered earlier may already name `id` as a parent.
        for parent in &unique {
            if self.reaches(parent, &id) {
                return Err(Error::RoleCycle {
                    role: id,
                    parent: parent.clone(),
                });
            }
        }

        self.order.push(id.clone());
        self.parents.insert(id, unique);
        Ok(())
    }

    /// Returns whether the role is registered.
    pub fn contains(&self, role: &str) -> bool {
        self.parents.contains_key(role)
    }

    /// Direct parents of a registered role.
    pub fn parents(&self, role: &str) -> Option<&[RoleId]> {
        self.parents.get(role).map(Vec::as_slice)
    }

    /// Registered roles in registration order.
    pub fn roles(&self) -> impl Iterator<Item = &RoleId> {
        self.order.iter()
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true when no role is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks that every referenced parent is registered.
    pub fn validate(&self) -> Result<()> {
        for role in &self.order {
            for parent in &self.parents[role] {
                if !self.parents.contains_key(parent) {
                    return Err(Error::UnknownRole(parent.clone()));
                }
            }
        }
        Ok(())
    }

    /// Returns `role` and every role reachable through its parent edges.
    pub fn resolve_ancestors(&self, role: &RoleId) -> Result<HashSet<RoleId>> {
        let closure = self.resolver().resolve(role)?;
        Ok(closure.as_ref().clone())
    }

    /// Starts a resolution pass that memoizes closures across calls.
    pub fn resolver(&self) -> AncestorResolver<'_> {
        AncestorResolver {
            registry: self,
            memo: HashMap::new(),
        }
    }

    fn reaches(&self, from: &RoleId, target: &RoleId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(parents) = self.parents.get(current) {
                stack.extend(parents.iter());
            }
        }
        false
    }
}

impl From<RoleRegistry> for Vec<RoleDefinition> {
    fn from(mut registry: RoleRegistry) -> Self {
        registry
            .order
            .into_iter()
            .map(|id| {
                let parents = registry.parents.remove(&id).unwrap_or_default();
                RoleDefinition { id, parents }
            })
            .collect()
    }
}

impl TryFrom<Vec<RoleDefinition>> for RoleRegistry {
    type Error = Error;

    fn try_from(definitions: Vec<RoleDefinition>) -> Result<Self> {
        Self::from_definitions(definitions)
    }
}

/// A single resolution pass over a [`RoleRegistry`].
///
/// Ancestor sets computed during the pass are kept, so a diamond-shaped
/// hierarchy is walked once per role rather than once per path.
#[derive(Debug)]
pub struct AncestorResolver<'a> {
    registry: &'a RoleRegistry,
    memo: HashMap<RoleId, Arc<HashSet<RoleId>>>,
}

impl AncestorResolver<'_> {
    /// Resolves the ancestor closure of `role`, including `role` itself.
    pub fn resolve(&mut self, role: &RoleId) -> Result<Arc<HashSet<RoleId>>> {
        if let Some(hit) = self.memo.get(role) {
            return Ok(Arc::clone(hit));
        }

        let registry = self.registry;
        let mut on_path = HashSet::from([role.clone()]);
        let mut stack: Vec<(RoleId, usize)> = vec![(role.clone(), 0)];

        while let Some((current, next)) = stack.pop() {
            let parents = registry
                .parents(current.as_str())
                .ok_or_else(|| Error::UnknownRole(current.clone()))?;

            if let Some(parent) = parents.get(next) {
                stack.push((current.clone(), next + 1));
                if self.memo.contains_key(parent) {
                    continue;
                }
                if !on_path.insert(parent.clone()) {
                    return Err(Error::RoleCycle {
                        role: current,
                        parent: parent.clone(),
                    });
                }
                stack.push((parent.clone(), 0));
                continue;
            }

            let mut closure = HashSet::from([current.clone()]);
            for parent in parents {
                if let Some(ancestors) = self.memo.get(parent) {
                    closure.extend(ancestors.iter().cloned());
                }
            }
            on_path.remove(&current);
            self.memo.insert(current, Arc::new(closure));
        }

        self.memo
            .get(role)
            .cloned()
            .ok_or_else(|| Error::UnknownRole(role.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(value: &str) -> RoleId {
        RoleId::try_from(value).unwrap()
    }

    fn roles(values: &[&str]) -> HashSet<RoleId> {
        values.iter().map(|value| role(value)).collect()
    }

    #[test]
    fn resolve_ancestors_should_include_role_itself() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("admin"), []).unwrap();

        let ancestors = registry.resolve_ancestors(&role("admin")).unwrap();
        assert_eq!(ancestors, roles(&["admin"]));
    }

    #[test]
    fn resolve_ancestors_should_follow_parents_transitively() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("admin"), []).unwrap();
        registry.register_role(role("editor"), [role("admin")]).unwrap();
        registry.register_role(role("writer"), [role("editor")]).unwrap();

        let ancestors = registry.resolve_ancestors(&role("writer")).unwrap();
        assert_eq!(ancestors, roles(&["writer", "editor", "admin"]));
    }

    #[test]
    fn resolve_ancestors_should_handle_diamonds() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("root"), []).unwrap();
        registry.register_role(role("left"), [role("root")]).unwrap();
        registry.register_role(role("right"), [role("root")]).unwrap();
        registry
            .register_role(role("bottom"), [role("left"), role("right")])
            .unwrap();

        let mut resolver = registry.resolver();
        let ancestors = resolver.resolve(&role("bottom")).unwrap();
        assert_eq!(*ancestors, roles(&["bottom", "left", "right", "root"]));

        let root = resolver.resolve(&role("root")).unwrap();
        assert_eq!(*root, roles(&["root"]));
    }

    #[test]
    fn resolve_ancestors_should_terminate_on_deep_diamond_ladders() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("level_0"), []).unwrap();
        for i in 1..=64 {
            let below = role(&format!("level_{}", i - 1));
            registry
                .register_role(role(&format!("side_a_{i}")), [below.clone()])
                .unwrap();
            registry
                .register_role(role(&format!("side_b_{i}")), [below])
                .unwrap();
            registry
                .register_role(
                    role(&format!("level_{i}")),
                    [role(&format!("side_a_{i}")), role(&format!("side_b_{i}"))],
                )
                .unwrap();
        }

        let ancestors = registry.resolve_ancestors(&role("level_64")).unwrap();
        assert_eq!(ancestors.len(), 1 + 64 * 3);
    }

    #[test]
    fn register_should_reject_self_parent() {
        let mut registry = RoleRegistry::new();
        let result = registry.register_role(role("admin"), [role("admin")]);
        assert!(matches!(result, Err(Error::RoleCycle { .. })));
        assert!(!registry.contains("admin"));
    }

    #[test]
    fn register_should_reject_two_role_cycle_via_forward_reference() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("a"), [role("b")]).unwrap();

        let result = registry.register_role(role("b"), [role("a")]);
        assert!(matches!(result, Err(Error::RoleCycle { .. })));
    }

    #[test]
    fn register_should_reject_long_cycle() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("a"), [role("b")]).unwrap();
        registry.register_role(role("b"), [role("c")]).unwrap();

        let result = registry.register_role(role("c"), [role("a")]);
        assert!(matches!(result, Err(Error::RoleCycle { .. })));
    }

    #[test]
    fn register_should_reject_duplicates() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("admin"), []).unwrap();

        let result = registry.register_role(role("admin"), []);
        assert!(matches!(result, Err(Error::DuplicateRole(id)) if id.as_str() == "admin"));
    }

    #[test]
    fn resolve_ancestors_should_fail_for_unknown_role() {
        let registry = RoleRegistry::new();
        let result = registry.resolve_ancestors(&role("ghost"));
        assert!(matches!(result, Err(Error::UnknownRole(_))));
    }

    #[test]
    fn resolve_ancestors_should_fail_for_dangling_parent() {
        let mut registry = RoleRegistry::new();
        registry.register_role(role("editor"), [role("admin")]).unwrap();

        let result = registry.resolve_ancestors(&role("editor"));
        assert!(matches!(result, Err(Error::UnknownRole(id)) if id.as_str() == "admin"));
    }

    #[test]
    fn from_definitions_should_reject_dangling_parent() {
        let result = RoleRegistry::from_definitions([RoleDefinition::new(
            role("editor"),
            [role("admin")],
        )]);
        let err = result.expect_err("must reject");
        assert!(err.is_configuration());
    }

    #[test]
    fn from_definitions_should_preserve_registration_order() {
        let registry = RoleRegistry::from_definitions([
            RoleDefinition::new(role("editor"), [role("admin")]),
            RoleDefinition::new(role("admin"), []),
        ])
        .unwrap();

        let order: Vec<&str> = registry.roles().map(RoleId::as_str).collect();
        assert_eq!(order, ["editor", "admin"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn definitions_should_round_trip_in_order() {
        let registry = RoleRegistry::from_definitions([
            RoleDefinition::new(role("editor"), [role("admin")]),
            RoleDefinition::new(role("admin"), []),
        ])
        .unwrap();

        let definitions = Vec::<RoleDefinition>::from(registry.clone());
        assert_eq!(
            definitions,
            [
                RoleDefinition::new(role("editor"), [role("admin")]),
                RoleDefinition::new(role("admin"), []),
            ]
        );
        let rebuilt = RoleRegistry::try_from(definitions).unwrap();
        assert_eq!(
            rebuilt.resolve_ancestors(&role("editor")).unwrap(),
            roles(&["editor", "admin"])
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_should_round_trip_and_revalidate() {
        let registry = RoleRegistry::from_definitions([
            RoleDefinition::new(role("admin"), []),
            RoleDefinition::new(role("editor"), [role("admin")]),
        ])
        .unwrap();

        let json = serde_json::to_string(&registry).unwrap();
        let decoded: RoleRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.roles().collect::<Vec<_>>(), registry.roles().collect::<Vec<_>>());
        assert_eq!(
            decoded.resolve_ancestors(&role("editor")).unwrap(),
            roles(&["editor", "admin"])
        );

        let cyclic = r#"[{"id":"a","parents":["b"]},{"id":"b","parents":["a"]}]"#;
        assert!(serde_json::from_str::<RoleRegistry>(cyclic).is_err());
    }
}
