//! Strategy that lets guest-capability holders ride along with a real holder.

use crate::capability::Capability;
use crate::types::{DenialSet, PrincipalId, ResolvedCapabilities};

use super::DecisionStrategy;

/// Checks every non-system principal on the chain.
///
/// A principal holding only the guest capability may stay on the chain as
/// long as some non-system principal holds the real capability. System
/// principals are skipped both ways: they need no justification and they do
/// not vouch for guests.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestAwareStrategy;

impl DecisionStrategy for GuestAwareStrategy {
    fn machinery(&self) -> PrincipalId {
        PrincipalId::new("guestpass:strategy:guest-aware")
    }

    fn evaluate(
        &self,
        capability: &Capability,
        chain: &[PrincipalId],
        resolved: &ResolvedCapabilities,
    ) -> DenialSet {
        let guest = Capability::guest(capability.clone());
        let mut guests = DenialSet::granted();
        let mut real_present = false;

        for principal in chain {
            let held = resolved.capabilities_of(principal);
            if held.is_system() {
                continue;
            }

            if held.implies(capability) {
                real_present = true;
            } else if held.implies(&guest) {
                guests.insert(principal.clone());
            } else {
                // Holding neither is a violation whatever else is on the chain.
                return DenialSet::single(principal.clone());
            }
        }

        if real_present {
            DenialSet::granted()
        } else {
            guests
        }
    }
}
