//! Role-based authorization core.
//!
//! Roles form an acyclic inheritance graph loaded from a [`RoleProvider`];
//! permissions are granted to roles by one or more [`PermissionProvider`]s.
//! The [`AuthorizationService`] answers "is this identity granted this
//! permission" and runs ordered route guards. Loaded snapshots are cached
//! through a pluggable [`CacheBackend`]. The default behavior is
//! deny-by-default.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory providers:
//! ```no_run
//! use rs_rbac::{
//!     AuthorizationServiceBuilder, MemoryPermissionProvider, MemoryRoleProvider,
//!     PermissionId, RoleId, SimpleIdentity,
//! };
//! let admin = RoleId::try_from("admin").unwrap();
//! let editor = RoleId::try_from("editor").unwrap();
//! let delete = PermissionId::try_from("deletePost").unwrap();
//!
//! let service = AuthorizationServiceBuilder::new()
//!     .role_provider(
//!         MemoryRoleProvider::new()
//!             .with_role(admin.clone(), [])
//!             .with_role(editor.clone(), [admin.clone()]),
//!     )
//!     .permission_provider(MemoryPermissionProvider::new("config").with_grant(delete.clone(), admin))
//!     .build();
//!
//! let identity = SimpleIdentity::new([editor]);
//! let _ = service.is_granted(&identity, &delete);
//! ```
//!
//! Guarding routes:
//! ```no_run
//! use rs_rbac::{AuthorizationServiceBuilder, GuardRule, RoleGuard, RoleId, RoutePattern};
//! let rule = GuardRule::new(
//!     RoutePattern::try_from("admin*").unwrap(),
//!     [RoleId::try_from("admin").unwrap()],
//! )
//! .unwrap();
//! let service = AuthorizationServiceBuilder::new()
//!     .guard(RoleGuard::new("route").rule(rule))
//!     .build();
//! # let _ = service;
//! ```
#![forbid(unsafe_code)]

mod aggregate;
mod assertion;
mod cache;
mod error;
mod guard;
mod hierarchy;
mod identity;
mod memory_cache;
mod memory_provider;
mod provider;
mod registry;
mod resolver;
mod service;
mod types;

#[cfg(feature = "serde")]
pub mod config;

pub use crate::aggregate::PermissionAggregate;
pub use crate::assertion::{Assertion, AssertionMap, Context};
pub use crate::cache::{CacheBackend, CacheFailurePolicy, CacheLayer, CacheValue, Cacheable, NoCache};
pub use crate::error::{Error, Result, SourceError};
pub use crate::guard::{
    Guard, GuardRule, GuardVerdict, PermissionGuard, ProtectionPolicy, RoleGuard, RoutePattern,
};
pub use crate::hierarchy::{ROLES_CACHE_KEY, RoleHierarchy};
pub use crate::identity::{Identity, SimpleIdentity};
pub use crate::memory_cache::MemoryCache;
pub use crate::memory_provider::{MemoryPermissionProvider, MemoryRoleProvider};
pub use crate::provider::{GrantMap, PermissionProvider, RoleDefinition, RoleProvider};
pub use crate::registry::{AncestorResolver, RoleRegistry};
pub use crate::resolver::Resolver;
pub use crate::service::{AuthorizationService, AuthorizationServiceBuilder, Decision};
pub use crate::types::{PermissionId, RoleId};

#[cfg(feature = "serde")]
pub use crate::config::RbacConfig;
