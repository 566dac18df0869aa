//! Decision strategies.
//!
//! A strategy looks at an already-trimmed chain together with the capability
//! sets resolved for it, and names the principals that cause a denial.

mod caller;
mod guest_aware;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::types::{DenialSet, PrincipalId, ResolvedCapabilities};

pub use caller::CallerStrategy;
pub use guest_aware::GuestAwareStrategy;

/// Pluggable decision strategy.
///
/// Implementations are stateless: the same inputs always yield the same
/// `DenialSet`.
pub trait DecisionStrategy: Send + Sync {
    /// Principal id of this strategy's own frames. Leading occurrences are
    /// trimmed off every chain before evaluation.
    fn machinery(&self) -> PrincipalId;

    /// Evaluate `capability` against `chain`, nearest caller first.
    fn evaluate(
        &self,
        capability: &Capability,
        chain: &[PrincipalId],
        resolved: &ResolvedCapabilities,
    ) -> DenialSet;
}

/// Strategy selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// [`CallerStrategy`]
    #[default]
    Caller,
    /// [`GuestAwareStrategy`]
    GuestAware,
}

impl DecisionStrategy for StrategyKind {
    fn machinery(&self) -> PrincipalId {
        match self {
            StrategyKind::Caller => CallerStrategy.machinery(),
            StrategyKind::GuestAware => GuestAwareStrategy.machinery(),
        }
    }

    fn evaluate(
        &self,
        capability: &Capability,
        chain: &[PrincipalId],
        resolved: &ResolvedCapabilities,
    ) -> DenialSet {
        match self {
            StrategyKind::Caller => CallerStrategy.evaluate(capability, chain, resolved),
            StrategyKind::GuestAware => GuestAwareStrategy.evaluate(capability, chain, resolved),
        }
    }
}
