//! Core types for the authorization engine.
//!
//! Provides principal identities, the `PrincipalRegistry` trait the engine
//! resolves capabilities through, the enforcement mode, and decision results.

use std::collections::HashMap;
use std::sync::Arc;

use crate::capability::CapabilitySet;

/// Environment variable selecting logging mode when set to `true`.
pub const LOG_MODE_ENV: &str = "GUESTPASS_LOG_MODE";

/// Principal identifier for one calling context.
///
/// Principal IDs are strings with conventional prefixes for human readability:
/// `module:app`, `framework:web`, `tenant:acme`.
/// The engine does not interpret the prefix, apart from the two reserved ids
/// returned by [`PrincipalId::engine`] and [`PrincipalId::privileged_helper`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Frames belonging to the engine itself. Never treated as calling context.
    pub fn engine() -> Self {
        Self::new("guestpass:engine")
    }

    /// Marker for the engine's own privileged helper. A chain containing it
    /// is granted without consulting any strategy.
    pub fn privileged_helper() -> Self {
        Self::new("guestpass:privileged-helper")
    }

    pub fn is_privileged_helper(&self) -> bool {
        self.0 == "guestpass:privileged-helper"
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether denials fail the caller or are recorded for later policy authoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnforcementMode {
    /// Denials return `AuthorizationError::AccessDenied`.
    #[default]
    Enforcing,
    /// Denials are recorded per origin and never fail the caller.
    Logging,
}

impl EnforcementMode {
    /// Read the mode from `GUESTPASS_LOG_MODE`.
    ///
    /// Only `true` (any case) selects logging mode.
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(LOG_MODE_ENV).ok().as_deref())
    }

    /// Interpret a log-mode flag value. Absent or anything other than `true`
    /// means enforcing.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("true") => EnforcementMode::Logging,
            _ => EnforcementMode::Enforcing,
        }
    }

    pub fn is_enforcing(&self) -> bool {
        matches!(self, EnforcementMode::Enforcing)
    }
}

/// Principals responsible for a denial. Empty means granted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenialSet {
    principals: Vec<PrincipalId>,
}

impl DenialSet {
    pub fn granted() -> Self {
        Self::default()
    }

    pub fn single(principal: PrincipalId) -> Self {
        Self {
            principals: vec![principal],
        }
    }

    /// Record a principal, ignoring duplicates. Insertion order is kept.
    pub fn insert(&mut self, principal: PrincipalId) {
        if !self.principals.contains(&principal) {
            self.principals.push(principal);
        }
    }

    pub fn is_granted(&self) -> bool {
        self.principals.is_empty()
    }

    pub fn contains(&self, principal: &PrincipalId) -> bool {
        self.principals.contains(principal)
    }

    pub fn principals(&self) -> &[PrincipalId] {
        &self.principals
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl FromIterator<PrincipalId> for DenialSet {
    fn from_iter<I: IntoIterator<Item = PrincipalId>>(iter: I) -> Self {
        let mut set = DenialSet::granted();
        for principal in iter {
            set.insert(principal);
        }
        set
    }
}

impl<'a> IntoIterator for &'a DenialSet {
    type Item = &'a PrincipalId;
    type IntoIter = std::slice::Iter<'a, PrincipalId>;

    fn into_iter(self) -> Self::IntoIter {
        self.principals.iter()
    }
}

/// Capability sets resolved for the principals of one chain.
///
/// Each distinct principal is resolved once; lookups for principals that
/// were never resolved see an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCapabilities {
    sets: HashMap<PrincipalId, CapabilitySet>,
}

impl ResolvedCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, principal: PrincipalId, set: CapabilitySet) {
        self.sets.insert(principal, set);
    }

    #[must_use]
    pub fn with(mut self, principal: impl Into<PrincipalId>, set: CapabilitySet) -> Self {
        self.insert(principal.into(), set);
        self
    }

    pub fn contains(&self, principal: &PrincipalId) -> bool {
        self.sets.contains_key(principal)
    }

    pub fn capabilities_of(&self, principal: &PrincipalId) -> &CapabilitySet {
        self.sets.get(principal).unwrap_or(CapabilitySet::empty())
    }

    /// True if the principal's set implies the all-capability.
    pub fn is_system(&self, principal: &PrincipalId) -> bool {
        self.capabilities_of(principal).is_system()
    }

    pub fn as_map(&self) -> &HashMap<PrincipalId, CapabilitySet> {
        &self.sets
    }
}

/// Source of the capabilities each principal holds.
///
/// Implementations must not make authorization decisions themselves, or the
/// engine would recurse into itself while resolving a chain.
/// The default implementation is the TOML registry in `guestpass-policy`.
pub trait PrincipalRegistry: Send + Sync {
    /// The capabilities currently held by `principal`. Unknown principals
    /// hold nothing.
    fn capabilities_of(&self, principal: &PrincipalId) -> CapabilitySet;

    /// Descriptor used to group logged denials, such as a code origin or
    /// tenant name.
    fn origin_of(&self, principal: &PrincipalId) -> String;
}

impl<R: PrincipalRegistry + ?Sized> PrincipalRegistry for Arc<R> {
    fn capabilities_of(&self, principal: &PrincipalId) -> CapabilitySet {
        (**self).capabilities_of(principal)
    }

    fn origin_of(&self, principal: &PrincipalId) -> String {
        (**self).origin_of(principal)
    }
}
