//! # Guestpass Authorization Engine
//!
//! Decides whether an ordered chain of calling principals may exercise a
//! capability, for processes where trust depends on calling context.
//!
//! This crate provides:
//! - `Capability` values with implication and equality semantics
//! - `GuestCapability`, which lets a principal sit on a chain without real power
//! - `CapabilityFactory` for building capabilities from `(kind, parameters)`
//! - `PrincipalRegistry` trait for pluggable capability lookup
//! - `CallerStrategy` and `GuestAwareStrategy` decision strategies
//! - `AuthorizationEngine` with enforcing and logging modes
//! - `ChainSnapshot` for deferred, privilege-gated decisions

pub mod audit;
pub mod capability;
pub mod construct;
pub mod engine;
pub mod error;
pub mod guest;
pub mod matching;
pub mod snapshot;
pub mod strategy;
pub mod types;

pub use audit::{AuditSink, DenialLog, MemoryAuditSink, PolicyGrant, TracingAuditSink, WriterAuditSink};
pub use capability::{Capability, CapabilitySet};
pub use construct::{CapabilityFactory, ParamType};
pub use engine::{AuthorizationEngine, Enforcer};
pub use error::{AuthorizationError, ConstructionError};
pub use guest::{CapabilityWrapper, GuestCapability};
pub use snapshot::{ChainSnapshot, observe_capability_sets, observe_principal_chain};
pub use strategy::{CallerStrategy, DecisionStrategy, GuestAwareStrategy, StrategyKind};
pub use types::{DenialSet, EnforcementMode, PrincipalId, PrincipalRegistry, ResolvedCapabilities};
