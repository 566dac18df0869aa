//! Strategy that trusts exactly one decision-maker: the most recent
//! non-system principal on the chain.

use crate::capability::Capability;
use crate::types::{DenialSet, PrincipalId, ResolvedCapabilities};

use super::DecisionStrategy;

/// Checks only the nearest caller that is not a system principal.
///
/// Suits chains whose members are enumerable and semi-trusted, where whoever
/// most recently decided to act is accountable for the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerStrategy;

impl CallerStrategy {
    /// The most recent non-system principal, if any.
    pub fn last_caller<'a>(
        chain: &'a [PrincipalId],
        resolved: &ResolvedCapabilities,
    ) -> Option<&'a PrincipalId> {
        chain.iter().find(|p| !resolved.is_system(p))
    }
}

impl DecisionStrategy for CallerStrategy {
    fn machinery(&self) -> PrincipalId {
        PrincipalId::new("guestpass:strategy:caller")
    }

    fn evaluate(
        &self,
        capability: &Capability,
        chain: &[PrincipalId],
        resolved: &ResolvedCapabilities,
    ) -> DenialSet {
        // An all-system chain has nobody to hold accountable.
        let Some(caller) = Self::last_caller(chain, resolved) else {
            return DenialSet::granted();
        };

        if resolved.capabilities_of(caller).implies(capability) {
            DenialSet::granted()
        } else {
            DenialSet::single(caller.clone())
        }
    }
}
