//! The authorization engine: trims the chain, honors the bypass marker,
//! dispatches to a strategy and applies the failure policy.

use tracing::{debug, trace, warn};

use crate::audit::{AuditSink, DenialLog, PolicyGrant, TracingAuditSink};
use crate::capability::Capability;
use crate::error::AuthorizationError;
use crate::snapshot::ChainSnapshot;
use crate::strategy::DecisionStrategy;
use crate::types::{DenialSet, EnforcementMode, PrincipalId, PrincipalRegistry, ResolvedCapabilities};

/// An engine that can be consulted for decisions without knowing its
/// concrete registry or strategy.
///
/// Snapshot accessors use this to check whoever is reading the snapshot.
pub trait Enforcer: Send + Sync {
    fn mode(&self) -> EnforcementMode;

    /// Check `capability` against `chain`, applying the failure policy.
    fn check(&self, capability: &Capability, chain: &[PrincipalId]) -> Result<(), AuthorizationError>;
}

/// The Guestpass authorization engine.
///
/// Decides whether an ordered chain of principals (nearest caller first) may
/// exercise a capability. Generic over a `PrincipalRegistry` that supplies
/// each principal's capabilities and a `DecisionStrategy` that interprets them.
///
/// At most one engine should act as the process-wide enforcer at a time.
/// Swapping the active engine is not atomic: callers must not run decisions
/// concurrently with the swap.
pub struct AuthorizationEngine<R: PrincipalRegistry, S: DecisionStrategy> {
    registry: R,
    strategy: S,
    mode: EnforcementMode,
    machinery: [PrincipalId; 2],
    /// Present only in logging mode.
    denials: Option<DenialLog>,
    sink: Box<dyn AuditSink>,
}

impl<R: PrincipalRegistry, S: DecisionStrategy> AuthorizationEngine<R, S> {
    /// Create an engine in the given mode. Logged denials go to a
    /// [`TracingAuditSink`] unless replaced with [`with_audit_sink`](Self::with_audit_sink).
    pub fn new(registry: R, strategy: S, mode: EnforcementMode) -> Self {
        let machinery = [PrincipalId::engine(), strategy.machinery()];
        let denials = match mode {
            EnforcementMode::Enforcing => None,
            EnforcementMode::Logging => Some(DenialLog::new()),
        };
        debug!(?mode, "created authorization engine");

        Self {
            registry,
            strategy,
            mode,
            machinery,
            denials,
            sink: Box::new(TracingAuditSink),
        }
    }

    /// Create an engine whose mode is read once from `GUESTPASS_LOG_MODE`.
    pub fn from_env(registry: R, strategy: S) -> Self {
        Self::new(registry, strategy, EnforcementMode::from_env())
    }

    /// Send the flushed denial log to `sink` instead.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// Get a reference to the principal registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    /// Decide whether `chain` may exercise `capability`.
    ///
    /// 1. Leading engine and strategy frames are trimmed off
    /// 2. A chain containing the privileged helper is granted outright
    /// 3. Otherwise the strategy names the principals at fault, if any
    /// 4. Denials fail in enforcing mode and are recorded in logging mode
    pub fn decide(&self, capability: &Capability, chain: &[PrincipalId]) -> Result<(), AuthorizationError> {
        let denied = self.evaluate(capability, chain);
        if denied.is_granted() {
            trace!(%capability, "granted");
            return Ok(());
        }
        self.handle_failure(capability, &denied)
    }

    /// Run a decision without applying the failure policy.
    pub fn evaluate(&self, capability: &Capability, chain: &[PrincipalId]) -> DenialSet {
        let chain = self.trim_chain(chain);
        if has_bypass(chain) {
            trace!(%capability, "privileged helper on chain, skipping checks");
            return DenialSet::granted();
        }

        let resolved = self.resolve(chain);
        self.strategy.evaluate(capability, chain, &resolved)
    }

    /// Decide against a snapshot's captured chain and capability sets,
    /// without resolving anything again.
    pub fn decide_with_snapshot(
        &self,
        capability: &Capability,
        snapshot: &ChainSnapshot,
    ) -> Result<(), AuthorizationError> {
        let denied = self
            .strategy
            .evaluate(capability, snapshot.chain(), snapshot.resolved());
        if denied.is_granted() {
            return Ok(());
        }
        self.handle_failure(capability, &denied)
    }

    /// Apply the failure policy to a non-empty denial.
    ///
    /// The error carries only the capability; the principals at
    /// fault go to the log.
    pub fn handle_failure(
        &self,
        capability: &Capability,
        denied: &DenialSet,
    ) -> Result<(), AuthorizationError> {
        let Some(log) = &self.denials else {
            debug!(%capability, principals = ?denied.principals(), "access denied");
            return Err(AuthorizationError::AccessDenied {
                capability: capability.clone(),
            });
        };

        for principal in denied {
            let origin = self.registry.origin_of(principal);
            if log.record(origin.clone(), capability.clone()) {
                warn!(%principal, %origin, %capability, "recorded denied capability");
            }
        }
        Ok(())
    }

    /// True iff the principal's capabilities imply the all-capability.
    pub fn is_system_principal(&self, principal: &PrincipalId) -> bool {
        self.registry.capabilities_of(principal).is_system()
    }

    /// Capture the trimmed chain and its resolved capability sets for a
    /// later, deferred decision.
    pub fn snapshot(&self, chain: &[PrincipalId]) -> ChainSnapshot {
        let chain = self.trim_chain(chain);
        ChainSnapshot::new(chain.to_vec(), self.resolve(chain))
    }

    /// Strip leading engine and strategy frames.
    pub fn trim_chain<'a>(&self, chain: &'a [PrincipalId]) -> &'a [PrincipalId] {
        let start = chain
            .iter()
            .take_while(|p| self.machinery.contains(p))
            .count();
        &chain[start..]
    }

    fn resolve(&self, chain: &[PrincipalId]) -> ResolvedCapabilities {
        let mut resolved = ResolvedCapabilities::new();
        for principal in chain {
            if !resolved.contains(principal) {
                resolved.insert(principal.clone(), self.registry.capabilities_of(principal));
            }
        }
        resolved
    }

    // =========================================================================
    // Logging mode
    // =========================================================================

    /// Denials recorded so far, grouped by origin. Empty in enforcing mode.
    pub fn pending_grants(&self) -> Vec<PolicyGrant> {
        self.denials
            .as_ref()
            .map(DenialLog::grants)
            .unwrap_or_default()
    }

    /// Flush the denial log to the audit sink. Runs at most once; also
    /// invoked when the engine is dropped.
    pub fn shutdown(&self) {
        if let Some(log) = &self.denials {
            log.flush(self.sink.as_ref());
        }
    }
}

impl<R: PrincipalRegistry, S: DecisionStrategy> Enforcer for AuthorizationEngine<R, S> {
    fn mode(&self) -> EnforcementMode {
        self.mode
    }

    fn check(&self, capability: &Capability, chain: &[PrincipalId]) -> Result<(), AuthorizationError> {
        self.decide(capability, chain)
    }
}

impl<R: PrincipalRegistry, S: DecisionStrategy> Drop for AuthorizationEngine<R, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn has_bypass(chain: &[PrincipalId]) -> bool {
    chain.iter().any(PrincipalId::is_privileged_helper)
}
