//! Error types for the authorization engine.

use thiserror::Error;

use crate::capability::Capability;

/// Errors from building a capability out of a `(kind, parameters)` pair.
///
/// These are configuration bugs, not security events, and are always
/// returned to whoever asked for the construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// No constructor is registered under this kind.
    #[error("unknown capability kind '{kind}'")]
    UnknownKind { kind: String },

    /// No registered constructor accepts this many string parameters.
    #[error("no constructor found for kind '{kind}' and parameter(s) {parameters:?}")]
    NoSuitableConstructor {
        kind: String,
        parameters: Vec<String>,
    },

    /// The chosen constructor rejected its arguments.
    #[error("failed to construct '{kind}' capability: {reason}")]
    InstantiationFailed { kind: String, reason: String },
}

/// Errors from authorization decisions.
///
/// `AccessDenied` carries the capability only; the principal at fault is
/// written to the engine's log and never handed to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The chain does not justify the requested capability.
    #[error("access denied: {capability}")]
    AccessDenied { capability: Capability },

    /// A snapshot accessor was called by a chain lacking the observe capability.
    #[error("access denied: snapshot access requires {required}")]
    InvalidSnapshotUse { required: Capability },
}
