use crate::types::RoleId;

/// The authenticated party an authorization check is about.
///
/// The engine reads nothing but the held roles. `subject` is exposed so
/// assertions can make ownership decisions.
pub trait Identity: Send + Sync {
    /// Roles held directly by this identity.
    fn roles(&self) -> &[RoleId];

    /// Stable subject identifier, if the identity has one.
    fn subject(&self) -> Option<&str> {
        None
    }
}

/// Plain identity holding a subject and a list of roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleIdentity {
    subject: Option<String>,
    roles: Vec<RoleId>,
}

impl SimpleIdentity {
    /// Creates an anonymous identity with the given roles.
    pub fn new(roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            subject: None,
            roles: roles.into_iter().collect(),
        }
    }

    /// Sets the subject identifier.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl Identity for SimpleIdentity {
    fn roles(&self) -> &[RoleId] {
        &self.roles
    }

    fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}
