use async_trait::async_trait;
use futures::executor::block_on;
use rs_rbac::{
    AuthorizationServiceBuilder, Context, Decision, Error, GrantMap, GuardRule, GuardVerdict,
    Identity, MemoryPermissionProvider, MemoryRoleProvider, PermissionGuard, PermissionId,
    PermissionProvider, ProtectionPolicy, RoleDefinition, RoleGuard, RoleId, RoleRegistry,
    RoutePattern, SimpleIdentity, SourceError,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn role(value: &str) -> RoleId {
    RoleId::try_from(value).unwrap()
}

fn perm(value: &str) -> PermissionId {
    PermissionId::try_from(value).unwrap()
}

fn rule<R>(pattern: &str, required: impl IntoIterator<Item = R>) -> GuardRule<R> {
    GuardRule::new(RoutePattern::try_from(pattern).unwrap(), required).unwrap()
}

struct CountingProvider {
    inner: MemoryPermissionProvider,
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl PermissionProvider for CountingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn load_grants(&self) -> Result<GrantMap, SourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_grants().await
    }
}

struct UnreachableProvider;

#[async_trait]
impl PermissionProvider for UnreachableProvider {
    fn name(&self) -> &str {
        "database"
    }

    async fn load_grants(&self) -> Result<GrantMap, SourceError> {
        Err("connection refused".into())
    }
}

#[test]
fn admin_is_granted_delete_post_and_guest_is_not() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(
            MemoryRoleProvider::new()
                .with_role(role("admin"), [])
                .with_role(role("guest"), []),
        )
        .permission_provider(
            MemoryPermissionProvider::new("config").with_grant(perm("deletePost"), role("admin")),
        )
        .build();

    let admin = SimpleIdentity::new([role("admin")]);
    let guest = SimpleIdentity::new([role("guest")]);
    assert!(block_on(service.is_granted(&admin, &perm("deletePost"))).unwrap());
    assert!(!block_on(service.is_granted(&guest, &perm("deletePost"))).unwrap());
}

#[test]
fn identity_without_roles_is_denied_everything() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(MemoryRoleProvider::new().with_role(role("admin"), []))
        .permission_provider(
            MemoryPermissionProvider::new("config")
                .with_grant(perm("deletePost"), role("admin"))
                .with_grant(perm("readPost"), role("admin")),
        )
        .build();
    let nobody = SimpleIdentity::default();

    for permission in ["deletePost", "readPost", "unconfigured"] {
        let decision = block_on(service.authorize(&nobody, &perm(permission), None)).unwrap();
        assert_eq!(decision, Decision::Deny);
    }
}

#[test]
fn editor_inherits_admin_grants() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(
            MemoryRoleProvider::new()
                .with_role(role("editor"), [role("admin")])
                .with_role(role("admin"), []),
        )
        .permission_provider(MemoryPermissionProvider::new("config").with_grant(perm("p"), role("admin")))
        .build();
    let editor = SimpleIdentity::new([role("editor")]);

    assert!(block_on(service.is_granted(&editor, &perm("p"))).unwrap());
    assert_eq!(
        block_on(service.effective_roles(&editor)).unwrap(),
        HashSet::from([role("editor"), role("admin")])
    );
}

#[test]
fn grants_are_unioned_across_providers() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(
            MemoryRoleProvider::new()
                .with_role(role("admin"), [])
                .with_role(role("editor"), []),
        )
        .permission_provider(MemoryPermissionProvider::new("config").with_grant(perm("p"), role("admin")))
        .permission_provider(MemoryPermissionProvider::new("database").with_grant(perm("p"), role("editor")))
        .build();

    let granting = block_on(service.resolver().permissions().granting_roles(&perm("p"))).unwrap();
    assert_eq!(granting, HashSet::from([role("admin"), role("editor")]));
    let editor = SimpleIdentity::new([role("editor")]);
    assert!(block_on(service.is_granted(&editor, &perm("p"))).unwrap());
}

#[test]
fn failing_provider_fails_the_check() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(MemoryRoleProvider::new().with_role(role("admin"), []))
        .permission_provider(MemoryPermissionProvider::new("config").with_grant(perm("p"), role("admin")))
        .permission_provider(UnreachableProvider)
        .build();
    let admin = SimpleIdentity::new([role("admin")]);

    let result = block_on(service.is_granted(&admin, &perm("p")));
    assert!(matches!(result, Err(Error::ProviderLoad { ref provider, .. }) if provider == "database"));
}

#[test]
fn consecutive_lookups_load_provider_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let service = AuthorizationServiceBuilder::new()
        .permission_provider(CountingProvider {
            inner: MemoryPermissionProvider::new("config").with_grant(perm("p"), role("admin")),
            loads: Arc::clone(&loads),
        })
        .build();
    let permissions = service.resolver().permissions();

    block_on(permissions.granting_roles(&perm("p"))).unwrap();
    block_on(permissions.granting_roles(&perm("p"))).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn assertion_vetoes_structural_grant() {
    struct Post {
        owner: String,
    }

    fn owns_post(identity: &dyn Identity, context: Option<Context<'_>>) -> bool {
        context
            .and_then(|value| value.downcast_ref::<Post>())
            .is_some_and(|post| identity.subject() == Some(post.owner.as_str()))
    }

    let service = AuthorizationServiceBuilder::new()
        .role_provider(MemoryRoleProvider::new().with_role(role("author"), []))
        .permission_provider(
            MemoryPermissionProvider::new("config").with_grant(perm("deletePost"), role("author")),
        )
        .assertion(perm("deletePost"), owns_post)
        .build();
    let alice = SimpleIdentity::new([role("author")]).with_subject("alice");
    let bobs_post = Post {
        owner: "bob".to_string(),
    };
    let alices_post = Post {
        owner: "alice".to_string(),
    };

    assert_eq!(
        block_on(service.authorize(&alice, &perm("deletePost"), Some(&bobs_post))).unwrap(),
        Decision::Deny
    );
    assert_eq!(
        block_on(service.authorize(&alice, &perm("deletePost"), Some(&alices_post))).unwrap(),
        Decision::Allow
    );
}

#[test]
fn first_matching_guard_rule_wins() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(
            MemoryRoleProvider::new()
                .with_role(role("admin"), [])
                .with_role(role("superadmin"), []),
        )
        .guard(
            RoleGuard::new("route")
                .rule(rule("admin*", [role("admin")]))
                .rule(rule("admin/users", [role("superadmin")])),
        )
        .build();
    let admin = SimpleIdentity::new([role("admin")]);

    let verdict = block_on(service.check_route(&admin, "admin/users")).unwrap();
    assert_eq!(verdict, GuardVerdict::Allow);
}

#[test]
fn unmatched_route_is_allowed_by_default() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(MemoryRoleProvider::new().with_role(role("admin"), []))
        .guard(RoleGuard::new("route").rule(rule("admin*", [role("admin")])))
        .build();

    for identity in [SimpleIdentity::default(), SimpleIdentity::new([role("admin")])] {
        assert!(block_on(service.check_route(&identity, "blog/index")).unwrap().is_allowed());
    }
}

#[test]
fn restrictive_guard_denies_unmatched_route() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(MemoryRoleProvider::new().with_role(role("admin"), []))
        .guard(
            RoleGuard::new("route")
                .policy(ProtectionPolicy::Restrictive)
                .rule(rule("admin*", [role("admin")])),
        )
        .build();
    let admin = SimpleIdentity::new([role("admin")]);

    assert_eq!(
        block_on(service.check_route(&admin, "blog/index")).unwrap(),
        GuardVerdict::Deny {
            guard: "route".to_string(),
            rule: None,
        }
    );
}

#[test]
fn permission_guard_uses_inherited_grants() {
    let service = AuthorizationServiceBuilder::new()
        .role_provider(
            MemoryRoleProvider::new()
                .with_role(role("admin"), [])
                .with_role(role("editor"), [role("admin")]),
        )
        .permission_provider(
            MemoryPermissionProvider::new("config")
                .with_grant(perm("post.edit"), role("admin"))
                .with_grant(perm("post.publish"), role("admin")),
        )
        .guard(
            PermissionGuard::new("permissions")
                .rule(rule("post/edit", [perm("post.edit"), perm("post.publish")])),
        )
        .build();

    let editor = SimpleIdentity::new([role("editor")]);
    let stranger = SimpleIdentity::new([role("ghost")]);
    assert!(block_on(service.check_route(&editor, "post/edit")).unwrap().is_allowed());
    assert!(!block_on(service.check_route(&stranger, "post/edit")).unwrap().is_allowed());
}

#[test]
fn registry_rejects_cycles_of_every_length() {
    let mut registry = RoleRegistry::new();
    assert!(matches!(
        registry.register_role(role("a"), [role("a")]),
        Err(Error::RoleCycle { .. })
    ));

    let definitions = vec![
        RoleDefinition::new(role("a"), [role("b")]),
        RoleDefinition::new(role("b"), [role("c")]),
        RoleDefinition::new(role("c"), [role("a")]),
    ];
    let result = RoleRegistry::from_definitions(definitions);
    assert!(matches!(result, Err(ref err) if err.is_configuration()));
}
