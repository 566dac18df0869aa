//! # Guestpass
//!
//! Convenience crate that re-exports the Guestpass authorization engine with
//! the default TOML principal registry.
//!
//! For custom registries, depend on `guestpass-engine` directly.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use guestpass::{Capability, PolicyRegistry, PrincipalId};
//!
//! // Load principals and engine settings from TOML
//! let registry = PolicyRegistry::from_toml(r#"
//!     [engine]
//!     strategy = "guest-aware"
//!
//!     [[principals]]
//!     id = "module:app"
//!     capabilities = [
//!         { kind = "file", parameters = ["data/*", "read"], guest = true },
//!     ]
//!
//!     [[principals]]
//!     id = "module:db"
//!     capabilities = [
//!         { kind = "file", parameters = ["data/*", "read"] },
//!     ]
//! "#).expect("Failed to parse policy");
//!
//! let engine = registry.into_engine();
//!
//! // The app module may sit on the chain because the db layer holds the
//! // real capability.
//! let chain = [PrincipalId::new("module:app"), PrincipalId::new("module:db")];
//! engine
//!     .decide(&Capability::scoped("file", "data/users", "read"), &chain)
//!     .expect("Access should be granted");
//! ```

// Re-export everything from the engine crate
pub use guestpass_engine::*;

// Re-export the default registry
pub use guestpass_policy::{PolicyConfig, PolicyConfigError, PolicyRegistry};
