use crate::types::RoleId;
use thiserror::Error;

/// Error raised by an external collaborator (provider or cache backend).
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Denials are not errors: an unknown permission or an unmatched guard
/// yields a deny value, never one of these variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid route pattern.
    #[error("invalid route pattern: {0}")]
    InvalidPattern(String),
    /// Invalid guard rule.
    #[error("invalid guard rule: {0}")]
    InvalidRule(String),
    /// Adding the edge `role -> parent` would close a cycle.
    #[error("role cycle detected at role {role} via parent {parent}")]
    RoleCycle { role: RoleId, parent: RoleId },
    /// Role is already registered.
    #[error("role {0} is already registered")]
    DuplicateRole(RoleId),
    /// Role is not registered.
    #[error("unknown role {0}")]
    UnknownRole(RoleId),
    /// A permission provider failed to load its grants.
    #[error("permission provider {provider} failed to load")]
    ProviderLoad {
        provider: String,
        #[source]
        source: SourceError,
    },
    /// The role provider failed to load its roles.
    #[error("role provider failed to load")]
    RoleLoad(#[source] SourceError),
    /// The cache backend failed.
    #[error("cache unavailable for key {key}")]
    CacheUnavailable {
        key: String,
        #[source]
        source: SourceError,
    },
}

impl Error {
    /// Returns true for faults in role configuration (cycles, duplicates,
    /// unknown roles).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::RoleCycle { .. } | Self::DuplicateRole(_) | Self::UnknownRole(_)
        )
    }
}
