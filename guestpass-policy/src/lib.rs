//! # Guestpass Policy
//!
//! Default principal registry for the Guestpass authorization engine.
//!
//! Provides TOML-based configuration for defining principals, their capability
//! sets (real and guest), pattern grants, and engine settings.

mod config;
mod policy;

pub use config::{
    CapabilityConfig, EngineConfig, GrantConfig, Parameters, PolicyConfig, PolicyConfigError,
    PrincipalConfig,
};
pub use policy::PolicyRegistry;
