use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-' | '.' | '/')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_simple_name(value.as_ref(), $kind).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// Role identifier.
    RoleId,
    "role id"
);
define_id_type!(
    /// Permission identifier, e.g. `deletePost` or `post.delete`.
    PermissionId,
    "permission id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_id_should_trim_and_keep_case() {
        let role = RoleId::try_from("  SuperAdmin ").unwrap();
        assert_eq!(role.as_str(), "SuperAdmin");
    }

    #[test]
    fn permission_id_should_accept_dotted_and_slashed_names() {
        assert!(PermissionId::try_from("post.delete").is_ok());
        assert!(PermissionId::try_from("admin/users:list").is_ok());
    }

    #[test]
    fn role_id_should_reject_empty() {
        let err = RoleId::try_from("   ").expect_err("must reject");
        assert!(err.to_string().contains("role id"));
    }

    #[test]
    fn permission_id_should_reject_wildcards_and_spaces() {
        assert!(matches!(
            PermissionId::try_from("post *"),
            Err(Error::InvalidId(_))
        ));
        assert!(matches!(
            PermissionId::try_from("post*"),
            Err(Error::InvalidId(_))
        ));
    }

    #[test]
    fn role_id_should_reject_overlong_names() {
        let long = "r".repeat(MAX_NAME_LEN + 1);
        assert!(RoleId::new(long).is_err());
    }

    #[test]
    fn ids_should_be_queryable_by_str() {
        let mut set = std::collections::HashSet::new();
        set.insert(RoleId::try_from("admin").unwrap());
        assert!(set.contains("admin"));
    }
}
