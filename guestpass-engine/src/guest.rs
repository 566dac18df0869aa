//! Capabilities defined in terms of another capability.
//!
//! A [`GuestCapability`] lets its holder sit on a chain while some other
//! principal exercises the real capability. It unlocks nothing on its own.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::capability::Capability;

/// Fixed name shared by every guest capability.
pub const GUEST_CAPABILITY_NAME: &str = "callStackPresence";

/// A capability that decorates another ("real") capability.
///
/// Comparisons between wrappers are delegated to the wrapped capabilities.
pub trait CapabilityWrapper {
    /// Kind string identifying this wrapper family member.
    const WRAPPER_KIND: &'static str;

    fn wrapped(&self) -> &Capability;

    /// True iff `other` is a wrapper whose wrapped capability is implied by ours.
    fn wrapped_implies(&self, other: &Capability) -> bool {
        other
            .wrapped()
            .is_some_and(|inner| self.wrapped().implies(inner))
    }

    /// True iff `other` is a wrapper whose wrapped capability equals ours.
    fn wrapped_equals(&self, other: &Capability) -> bool {
        other.wrapped().is_some_and(|inner| self.wrapped() == inner)
    }

    /// Stable textual form: `("<wrapper-kind>" ("<inner-kind>" "<param>" ...))`.
    fn render(&self) -> String {
        format!("({:?} {})", Self::WRAPPER_KIND, self.wrapped())
    }
}

/// Presence on the chain for the wrapped capability, valid only when a
/// non-system principal on the same chain holds the real capability.
#[derive(Debug, Clone)]
pub struct GuestCapability {
    real: Box<Capability>,
}

impl GuestCapability {
    pub fn new(real: Capability) -> Self {
        Self {
            real: Box::new(real),
        }
    }

    /// The real capability this guest stands for.
    pub fn real(&self) -> &Capability {
        &self.real
    }

    pub fn name(&self) -> &'static str {
        GUEST_CAPABILITY_NAME
    }

    /// Guests have no actions of their own.
    pub fn actions(&self) -> &'static str {
        ""
    }

    /// True iff `other` is a guest capability whose real capability is
    /// implied by this one's.
    pub fn implies(&self, other: &Capability) -> bool {
        other.is_guest() && self.wrapped_implies(other)
    }
}

impl CapabilityWrapper for GuestCapability {
    const WRAPPER_KIND: &'static str = "guest";

    fn wrapped(&self) -> &Capability {
        &self.real
    }
}

impl PartialEq for GuestCapability {
    fn eq(&self, other: &Self) -> bool {
        self.real == other.real
    }
}

impl Eq for GuestCapability {}

impl PartialEq<Capability> for GuestCapability {
    fn eq(&self, other: &Capability) -> bool {
        other.is_guest() && self.wrapped_equals(other)
    }
}

impl Hash for GuestCapability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.real.hash(state);
    }
}

impl fmt::Display for GuestCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn set_io() -> Capability {
        Capability::named("runtime", "setIO")
    }

    #[test]
    fn test_guest_implies_guest_of_implied() {
        let guest = GuestCapability::new(Capability::named("runtime", "*"));
        assert!(guest.implies(&Capability::guest(set_io())));
        assert!(!guest.implies(&Capability::guest(Capability::named("logging", "control"))));
    }

    #[test]
    fn test_guest_never_implies_real() {
        let guest = GuestCapability::new(set_io());
        assert!(!guest.implies(&set_io()));
        assert!(!Capability::guest(set_io()).implies(&set_io()));
    }

    #[test]
    fn test_real_never_implies_guest() {
        assert!(!set_io().implies(&Capability::guest(set_io())));
    }

    #[test]
    fn test_guest_equality_follows_wrapped() {
        assert_eq!(GuestCapability::new(set_io()), GuestCapability::new(set_io()));
        assert_ne!(
            GuestCapability::new(set_io()),
            GuestCapability::new(Capability::named("runtime", "exitVM"))
        );
        assert!(GuestCapability::new(set_io()) == Capability::guest(set_io()));
        assert!(GuestCapability::new(set_io()) != set_io());
    }

    #[test]
    fn test_guest_hash_is_wrapped_hash() {
        let guest = GuestCapability::new(set_io());
        assert_eq!(hash_of(&guest), hash_of(&set_io()));

        let mut seen = HashSet::new();
        seen.insert(Capability::guest(set_io()));
        assert!(seen.contains(&Capability::guest(set_io())));
        assert!(!seen.contains(&set_io()));
    }

    #[test]
    fn test_guest_identity() {
        let guest = GuestCapability::new(Capability::scoped("file", "a", "read"));
        assert_eq!(guest.name(), GUEST_CAPABILITY_NAME);
        assert_eq!(guest.actions(), "");
        assert_eq!(Capability::from(guest.clone()).kind(), "guest");
        assert_eq!(Capability::from(guest).actions(), "");
    }

    #[test]
    fn test_render() {
        let guest = GuestCapability::new(Capability::scoped("file", "target/foo", "read,write"));
        assert_eq!(
            guest.render(),
            r#"("guest" ("file" "target/foo" "read,write"))"#
        );
        assert_eq!(guest.to_string(), guest.render());
        assert_eq!(Capability::from(guest.clone()).to_string(), guest.render());
    }
}
