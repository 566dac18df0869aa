//! Privileged captures of a chain for deferred decisions.

use std::collections::HashMap;

use crate::capability::{Capability, CapabilitySet};
use crate::engine::Enforcer;
use crate::error::AuthorizationError;
use crate::types::{PrincipalId, ResolvedCapabilities};

/// Capability needed to read a snapshot's principals.
pub fn observe_principal_chain() -> Capability {
    Capability::named("runtime", "observePrincipalChain")
}

/// Additional capability needed to read a snapshot's capability sets.
pub fn observe_capability_sets() -> Capability {
    Capability::named("runtime", "observeCapabilitySets")
}

/// An immutable capture of a trimmed chain and the capability sets each of
/// its principals held at capture time.
///
/// Only the engine creates snapshots. Reading one back out is gated: the
/// accessors check the *reader's* chain, not the captured one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    principals: Vec<PrincipalId>,
    resolved: ResolvedCapabilities,
}

impl ChainSnapshot {
    pub(crate) fn new(principals: Vec<PrincipalId>, resolved: ResolvedCapabilities) -> Self {
        Self {
            principals,
            resolved,
        }
    }

    /// The captured principals, nearest caller first.
    ///
    /// With an enforcer present, `caller` must hold
    /// [`observe_principal_chain`].
    pub fn principals(
        &self,
        enforcer: Option<&dyn Enforcer>,
        caller: &[PrincipalId],
    ) -> Result<&[PrincipalId], AuthorizationError> {
        if let Some(enforcer) = enforcer {
            require(enforcer, observe_principal_chain(), caller)?;
        }
        Ok(&self.principals)
    }

    /// The captured capability set of every principal.
    ///
    /// With an enforcer present, `caller` must hold both
    /// [`observe_principal_chain`] and [`observe_capability_sets`].
    pub fn capability_sets(
        &self,
        enforcer: Option<&dyn Enforcer>,
        caller: &[PrincipalId],
    ) -> Result<&HashMap<PrincipalId, CapabilitySet>, AuthorizationError> {
        if let Some(enforcer) = enforcer {
            require(enforcer, observe_principal_chain(), caller)?;
            require(enforcer, observe_capability_sets(), caller)?;
        }
        Ok(self.resolved.as_map())
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    pub(crate) fn chain(&self) -> &[PrincipalId] {
        &self.principals
    }

    pub(crate) fn resolved(&self) -> &ResolvedCapabilities {
        &self.resolved
    }
}

fn require(
    enforcer: &dyn Enforcer,
    required: Capability,
    caller: &[PrincipalId],
) -> Result<(), AuthorizationError> {
    match enforcer.check(&required, caller) {
        Ok(()) => Ok(()),
        Err(_) => Err(AuthorizationError::InvalidSnapshotUse { required }),
    }
}
