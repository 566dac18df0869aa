//! TOML configuration parsing for the policy registry.

use guestpass_engine::{CapabilityFactory, ConstructionError, EnforcementMode, StrategyKind};
use serde::Deserialize;
use thiserror::Error;

/// Errors from policy configuration parsing.
#[derive(Error, Debug)]
pub enum PolicyConfigError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid capability for '{owner}': {source}")]
    Construction {
        owner: String,
        #[source]
        source: ConstructionError,
    },
}

/// Top-level policy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Principals and the capabilities they hold.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,

    /// Grants applied to every principal matching a pattern.
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

/// The `[engine]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Record denials instead of failing. When absent, `GUESTPASS_LOG_MODE`
    /// decides.
    #[serde(default)]
    pub log_mode: Option<bool>,

    /// Decision strategy: "caller" (default) or "guest-aware".
    #[serde(default)]
    pub strategy: StrategyKind,
}

impl EngineConfig {
    /// Resolve the enforcement mode. Read once, when an engine is built.
    pub fn mode(&self) -> EnforcementMode {
        match self.log_mode {
            Some(true) => EnforcementMode::Logging,
            Some(false) => EnforcementMode::Enforcing,
            None => EnforcementMode::from_env(),
        }
    }
}

/// Configuration for a single principal.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    /// The principal ID (e.g., "module:app", "framework:web").
    pub id: String,

    /// Origin used to group logged denials. Defaults to the principal ID.
    #[serde(default)]
    pub origin: Option<String>,

    /// Grant the all-capability, making this a system principal.
    #[serde(default)]
    pub system: bool,

    /// The principal's capabilities.
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
}

/// Capabilities for every principal whose ID matches one of the patterns.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    /// Principal ID patterns. Supports glob patterns (e.g., "framework:*").
    pub principals: Vec<String>,

    #[serde(default)]
    pub system: bool,

    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
}

/// A single capability, described by kind and parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityConfig {
    /// Capability kind registered with the factory (e.g., "runtime", "file").
    pub kind: String,

    /// Constructor parameters: a list, or a single pipe-separated string.
    #[serde(default)]
    pub parameters: Parameters,

    /// Grant the guest capability for this capability instead of the real one.
    #[serde(default)]
    pub guest: bool,
}

/// Capability parameters as written in the policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    /// `parameters = ["target/foo", "read,write"]`
    List(Vec<String>),
    /// `parameters = "target/foo|read,write"`
    Piped(String),
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::List(Vec::new())
    }
}

impl Parameters {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Parameters::List(values) => values.clone(),
            Parameters::Piped(raw) => CapabilityFactory::parse_parameters(raw),
        }
    }
}

impl PolicyConfig {
    /// Load policy from a TOML file path.
    pub fn from_file(path: &std::path::Path) -> Result<Self, PolicyConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse policy from a TOML string.
    pub fn parse(content: &str) -> Result<Self, PolicyConfigError> {
        let config: PolicyConfig = toml::from_str(content)?;
        Ok(config)
    }
}
