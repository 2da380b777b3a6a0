//! Route guards.
//!
//! A guard is an ordered list of rules mapping a route pattern to the roles
//! (or permissions) needed to reach it. Guards run before dispatch and only
//! look at the route identifier and the identity's effective roles.
//!
//! Within one guard the first matching rule in declared order governs. A
//! route no rule matches is allowed unless the guard is restrictive.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::{PermissionId, RoleId};

/// Route identifier pattern: exact match or suffix wildcard (`admin*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    prefix: Option<usize>,
}

impl RoutePattern {
    /// Parses a pattern. `*` is only allowed as the last character.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let raw = value.as_ref().trim();
        if raw.is_empty() {
            return Err(Error::InvalidPattern(
                "pattern must not be empty".to_string(),
            ));
        }
        let stem = raw.strip_suffix('*');
        if stem.unwrap_or(raw).contains('*') {
            return Err(Error::InvalidPattern(format!(
                "{raw}: wildcard is only allowed at the end"
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            prefix: stem.map(str::len),
        })
    }

    /// Returns whether `route` matches this pattern.
    pub fn matches(&self, route: &str) -> bool {
        match self.prefix {
            Some(len) => route.starts_with(&self.raw[..len]),
            None => route == self.raw,
        }
    }

    /// Pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true for a suffix wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.prefix.is_some()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<&str> for RoutePattern {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// A pattern and the requirements it imposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRule<R> {
    pattern: RoutePattern,
    required: Vec<R>,
}

impl<R> GuardRule<R> {
    /// Creates a rule. An empty requirement list is rejected.
    pub fn new(pattern: RoutePattern, required: impl IntoIterator<Item = R>) -> Result<Self> {
        let required: Vec<R> = required.into_iter().collect();
        if required.is_empty() {
            return Err(Error::InvalidRule(format!(
                "{pattern}: at least one requirement is needed"
            )));
        }
        Ok(Self { pattern, required })
    }

    /// Route pattern this rule applies to.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Requirements, in declared order.
    pub fn required(&self) -> &[R] {
        &self.required
    }
}

/// What a guard does with a route none of its rules match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProtectionPolicy {
    /// Unmatched routes are allowed.
    #[default]
    Permissive,
    /// Unmatched routes are denied.
    Restrictive,
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// The route may be dispatched.
    Allow,
    /// The route is rejected.
    Deny {
        /// Name of the guard that denied.
        guard: String,
        /// Pattern of the rule that triggered the denial; `None` when a
        /// restrictive guard matched no rule.
        rule: Option<String>,
    },
}

impl GuardVerdict {
    /// Returns true for [`GuardVerdict::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

fn first_match<'a, R>(rules: &'a [GuardRule<R>], route: &str) -> Option<&'a GuardRule<R>> {
    rules.iter().find(|rule| rule.pattern.matches(route))
}

fn unmatched(name: &str, policy: ProtectionPolicy) -> GuardVerdict {
    match policy {
        ProtectionPolicy::Permissive => GuardVerdict::Allow,
        ProtectionPolicy::Restrictive => GuardVerdict::Deny {
            guard: name.to_string(),
            rule: None,
        },
    }
}

fn denied<R>(name: &str, rule: &GuardRule<R>) -> GuardVerdict {
    GuardVerdict::Deny {
        guard: name.to_string(),
        rule: Some(rule.pattern.raw.clone()),
    }
}

/// Guard requiring at least one of the listed roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGuard {
    name: String,
    rules: Vec<GuardRule<RoleId>>,
    policy: ProtectionPolicy,
}

impl RoleGuard {
    /// Creates a permissive guard without rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            policy: ProtectionPolicy::default(),
        }
    }

    /// Appends a rule. Rules keep the order they are added in.
    pub fn rule(mut self, rule: GuardRule<RoleId>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets what happens to routes no rule matches.
    pub fn policy(mut self, policy: ProtectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Name reported in deny verdicts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[GuardRule<RoleId>] {
        &self.rules
    }

    /// Evaluates `route` against the identity's effective roles.
    pub fn evaluate(&self, route: &str, roles: &HashSet<RoleId>) -> GuardVerdict {
        let Some(rule) = first_match(&self.rules, route) else {
            return unmatched(&self.name, self.policy);
        };
        if rule.required.iter().any(|role| roles.contains(role)) {
            GuardVerdict::Allow
        } else {
            denied(&self.name, rule)
        }
    }
}

/// Guard requiring every listed permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGuard {
    name: String,
    rules: Vec<GuardRule<PermissionId>>,
    policy: ProtectionPolicy,
}

impl PermissionGuard {
    /// Creates a permissive guard without rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            policy: ProtectionPolicy::default(),
        }
    }

    /// Appends a rule. Rules keep the order they are added in.
    pub fn rule(mut self, rule: GuardRule<PermissionId>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets what happens to routes no rule matches.
    pub fn policy(mut self, policy: ProtectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Name reported in deny verdicts.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[GuardRule<PermissionId>] {
        &self.rules
    }

    /// Evaluates `route`; `is_granted` answers for a single permission.
    pub fn evaluate(&self, route: &str, is_granted: impl Fn(&PermissionId) -> bool) -> GuardVerdict {
        let Some(rule) = first_match(&self.rules, route) else {
            return unmatched(&self.name, self.policy);
        };
        if rule.required.iter().all(is_granted) {
            GuardVerdict::Allow
        } else {
            denied(&self.name, rule)
        }
    }
}

/// Any guard the authorization service can chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Role(RoleGuard),
    Permission(PermissionGuard),
}

impl Guard {
    /// Name of the wrapped guard.
    pub fn name(&self) -> &str {
        match self {
            Self::Role(guard) => guard.name(),
            Self::Permission(guard) => guard.name(),
        }
    }
}

impl From<RoleGuard> for Guard {
    fn from(guard: RoleGuard) -> Self {
        Self::Role(guard)
    }
}

impl From<PermissionGuard> for Guard {
    fn from(guard: PermissionGuard) -> Self {
        Self::Permission(guard)
    }
}
