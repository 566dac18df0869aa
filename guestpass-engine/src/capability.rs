//! Capability values and their implication rules.
//!
//! A [`Capability`] is an immutable value compared two ways: by *implication*
//! (does holding `a` satisfy a request for `b`?) and by structural *equality*.

use std::collections::BTreeSet;
use std::fmt;

use crate::guest::{CapabilityWrapper, GuestCapability};
use crate::matching::matches_pattern;

/// Kind string of the all-capability.
pub const ALL_KIND: &str = "all";

/// Actions reported by the all-capability.
pub const ALL_ACTIONS: &str = "<all actions>";

/// An authorization token with implication and equality semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Implies every capability. Holding it marks a principal as system.
    All,

    /// A name-only capability such as `runtime/setIO`.
    ///
    /// The held name is a glob pattern: `*` covers every name of the kind.
    Named { kind: String, name: String },

    /// A capability over a target with an action set, such as
    /// `file target/foo read,write`.
    ///
    /// The held target is a glob pattern; the held actions must be a superset
    /// of the requested actions.
    Scoped {
        kind: String,
        target: String,
        actions: BTreeSet<String>,
    },

    /// Permission to be present on a chain alongside a real holder.
    Guest(GuestCapability),
}

impl Capability {
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Capability::Named {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Build a scoped capability; `actions` is a comma-separated list.
    ///
    /// An empty list is accepted and yields a capability that only implies
    /// other empty-action capabilities on matching targets. Declarative
    /// construction through [`CapabilityFactory`](crate::CapabilityFactory)
    /// rejects it.
    pub fn scoped(kind: impl Into<String>, target: impl Into<String>, actions: &str) -> Self {
        Capability::Scoped {
            kind: kind.into(),
            target: target.into(),
            actions: parse_actions(actions),
        }
    }

    /// Wrap `real` in a guest capability.
    pub fn guest(real: Capability) -> Self {
        Capability::Guest(GuestCapability::new(real))
    }

    pub fn kind(&self) -> &str {
        match self {
            Capability::All => ALL_KIND,
            Capability::Named { kind, .. } | Capability::Scoped { kind, .. } => kind,
            Capability::Guest(_) => GuestCapability::WRAPPER_KIND,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Capability::All => "<all capabilities>",
            Capability::Named { name, .. } => name,
            Capability::Scoped { target, .. } => target,
            Capability::Guest(guest) => guest.name(),
        }
    }

    /// Canonical action list: sorted and comma-joined.
    pub fn actions(&self) -> String {
        match self {
            Capability::All => ALL_ACTIONS.to_string(),
            Capability::Scoped { actions, .. } => join_actions(actions),
            Capability::Named { .. } => String::new(),
            Capability::Guest(guest) => guest.actions().to_string(),
        }
    }

    /// Does holding `self` satisfy a request for `other`?
    pub fn implies(&self, other: &Capability) -> bool {
        match (self, other) {
            (Capability::All, _) => true,
            (
                Capability::Named { kind, name },
                Capability::Named {
                    kind: other_kind,
                    name: other_name,
                },
            ) => kind == other_kind && held_covers(name, other_name),
            (
                Capability::Scoped {
                    kind,
                    target,
                    actions,
                },
                Capability::Scoped {
                    kind: other_kind,
                    target: other_target,
                    actions: other_actions,
                },
            ) => {
                kind == other_kind
                    && held_covers(target, other_target)
                    && actions.is_superset(other_actions)
            }
            (Capability::Guest(guest), _) => guest.implies(other),
            _ => false,
        }
    }

    /// The wrapped capability, if this is a wrapper.
    pub fn wrapped(&self) -> Option<&Capability> {
        match self {
            Capability::Guest(guest) => Some(guest.wrapped()),
            _ => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Capability::Guest(_))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::All => write!(f, "({ALL_KIND:?})"),
            Capability::Named { kind, name } => write!(f, "({kind:?} {name:?})"),
            Capability::Scoped {
                kind,
                target,
                actions,
            } => write!(f, "({kind:?} {target:?} {:?})", join_actions(actions)),
            Capability::Guest(guest) => write!(f, "{}", guest.render()),
        }
    }
}

impl From<GuestCapability> for Capability {
    fn from(guest: GuestCapability) -> Self {
        Capability::Guest(guest)
    }
}

/// Parse a comma-separated action list into its canonical form.
pub fn parse_actions(actions: &str) -> BTreeSet<String> {
    actions
        .split(',')
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| !a.is_empty())
        .collect()
}

/// A held name or target covers a requested one when it is literally equal
/// or matches it as a glob.
fn held_covers(held: &str, requested: &str) -> bool {
    held == requested || matches_pattern(held, requested)
}

fn join_actions(actions: &BTreeSet<String>) -> String {
    actions.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

static EMPTY_SET: CapabilitySet = CapabilitySet::new();

/// The capabilities held by one principal at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    capabilities: Vec<Capability>,
}

impl CapabilitySet {
    pub const fn new() -> Self {
        Self {
            capabilities: Vec::new(),
        }
    }

    /// A set holding only the all-capability.
    pub fn system() -> Self {
        Self {
            capabilities: vec![Capability::All],
        }
    }

    /// Shared empty set, used for principals nobody resolved.
    pub fn empty() -> &'static CapabilitySet {
        &EMPTY_SET
    }

    /// Add a capability. Returns `false` if an equal one was already held.
    pub fn insert(&mut self, capability: Capability) -> bool {
        if self.capabilities.contains(&capability) {
            return false;
        }
        self.capabilities.push(capability);
        true
    }

    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    /// True if any held capability implies `capability`.
    pub fn implies(&self, capability: &Capability) -> bool {
        self.capabilities.iter().any(|held| held.implies(capability))
    }

    /// True if the set implies the all-capability.
    pub fn is_system(&self) -> bool {
        self.implies(&Capability::All)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Capability> {
        self.capabilities.iter()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<I: IntoIterator<Item = Capability>>(&mut self, iter: I) {
        for capability in iter {
            self.insert(capability);
        }
    }
}

impl<'a> IntoIterator for &'a CapabilitySet {
    type Item = &'a Capability;
    type IntoIter = std::slice::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.capabilities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_implies_everything() {
        assert!(Capability::All.implies(&Capability::named("runtime", "setIO")));
        assert!(Capability::All.implies(&Capability::scoped("file", "x", "read")));
        assert!(Capability::All.implies(&Capability::guest(Capability::All)));
        assert!(Capability::All.implies(&Capability::All));
    }

    #[test]
    fn test_only_all_implies_all() {
        assert!(!Capability::named("runtime", "*").implies(&Capability::All));
        assert!(!Capability::guest(Capability::All).implies(&Capability::All));
    }

    #[test]
    fn test_named_wildcards() {
        let held = Capability::named("runtime", "db.*");
        assert!(held.implies(&Capability::named("runtime", "db.read")));
        assert!(!held.implies(&Capability::named("runtime", "cache.read")));
        assert!(!held.implies(&Capability::named("logging", "db.read")));
    }

    #[test]
    fn test_scoped_requires_action_superset() {
        let held = Capability::scoped("file", "target/*", "read,write");
        assert!(held.implies(&Capability::scoped("file", "target/foo", "read")));
        assert!(held.implies(&Capability::scoped("file", "target/foo", "write, read")));
        assert!(!held.implies(&Capability::scoped("file", "target/foo", "read,delete")));
        assert!(!held.implies(&Capability::scoped("file", "other/foo", "read")));
    }

    #[test]
    fn test_actions_are_canonical() {
        let cap = Capability::scoped("file", "target/foo", "Write, read,,read");
        assert_eq!(cap.actions(), "read,write");
        assert_eq!(cap, Capability::scoped("file", "target/foo", "read,write"));
        assert_eq!(Capability::All.actions(), ALL_ACTIONS);
        assert_eq!(Capability::named("runtime", "setIO").actions(), "");
    }

    #[test]
    fn test_display_is_stable() {
        assert_eq!(
            Capability::named("runtime", "setIO").to_string(),
            r#"("runtime" "setIO")"#
        );
        assert_eq!(
            Capability::scoped("file", "target/foo", "write,read").to_string(),
            r#"("file" "target/foo" "read,write")"#
        );
        assert_eq!(Capability::All.to_string(), r#"("all")"#);
    }

    #[test]
    fn test_glob_metacharacters_imply_themselves() {
        for target in ["data/report[2024].csv", "data/{a,b}.txt", "a[b", "what?"] {
            let held = Capability::scoped("file", target, "read");
            assert!(held.implies(&held.clone()), "{target} should imply itself");
            assert!(Capability::guest(held.clone()).implies(&Capability::guest(held)));

            let named = Capability::named("runtime", target);
            assert!(named.implies(&named.clone()), "{target} should imply itself");
        }
    }

    #[test]
    fn test_empty_actions_render_apart_from_named() {
        let named = Capability::named("file", "t");
        let scoped = Capability::scoped("file", "t", "");
        assert_eq!(scoped.to_string(), r#"("file" "t" "")"#);
        assert_ne!(named.to_string(), scoped.to_string());
        assert!(scoped.implies(&Capability::scoped("file", "t", "")));
        assert!(!scoped.implies(&Capability::scoped("file", "t", "read")));
    }

    #[test]
    fn test_capability_set_deduplicates() {
        let mut set = CapabilitySet::new();
        assert!(set.insert(Capability::named("runtime", "setIO")));
        assert!(!set.insert(Capability::named("runtime", "setIO")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_capability_set_system() {
        assert!(CapabilitySet::system().is_system());
        assert!(!CapabilitySet::new().is_system());
        let wide = CapabilitySet::new().with(Capability::named("runtime", "*"));
        assert!(!wide.is_system());
        assert!(CapabilitySet::empty().is_empty());
    }
}
