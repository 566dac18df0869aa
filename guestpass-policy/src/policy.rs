//! TOML-backed principal registry.

use std::collections::HashMap;

use guestpass_engine::matching::matches_pattern;
use guestpass_engine::{
    AuthorizationEngine, Capability, CapabilityFactory, CapabilitySet, PrincipalId,
    PrincipalRegistry, StrategyKind,
};
use tracing::debug;

use crate::config::{CapabilityConfig, EngineConfig, PolicyConfig, PolicyConfigError};

/// Principal registry loaded from a policy file.
///
/// Each principal's capability set is the union of its own entry and every
/// pattern grant that matches its ID. Capabilities are constructed when the
/// policy is loaded, so a misconfigured capability fails the load instead of
/// a later decision.
pub struct PolicyRegistry {
    /// Explicit principals, keyed by ID.
    principals: HashMap<String, PrincipalEntry>,
    /// Pattern grants, in file order.
    grants: Vec<PatternGrant>,
    engine: EngineConfig,
}

struct PrincipalEntry {
    origin: Option<String>,
    capabilities: CapabilitySet,
}

struct PatternGrant {
    patterns: Vec<String>,
    capabilities: CapabilitySet,
}

impl PolicyRegistry {
    /// Create a registry from a parsed configuration, using the built-in
    /// capability kinds.
    pub fn from_config(config: PolicyConfig) -> Result<Self, PolicyConfigError> {
        Self::from_config_with_factory(config, &CapabilityFactory::with_builtins())
    }

    /// Create a registry from a parsed configuration with a custom factory.
    pub fn from_config_with_factory(
        config: PolicyConfig,
        factory: &CapabilityFactory,
    ) -> Result<Self, PolicyConfigError> {
        let mut principals = HashMap::new();
        for principal in config.principals {
            let capabilities =
                build_capabilities(&principal.id, principal.system, &principal.capabilities, factory)?;
            principals.insert(
                principal.id,
                PrincipalEntry {
                    origin: principal.origin,
                    capabilities,
                },
            );
        }

        let mut grants = Vec::with_capacity(config.grants.len());
        for grant in config.grants {
            let owner = grant.principals.join(",");
            grants.push(PatternGrant {
                capabilities: build_capabilities(&owner, grant.system, &grant.capabilities, factory)?,
                patterns: grant.principals,
            });
        }

        debug!(
            principals = principals.len(),
            grants = grants.len(),
            "loaded principal registry"
        );

        Ok(Self {
            principals,
            grants,
            engine: config.engine,
        })
    }

    /// Create a registry from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, PolicyConfigError> {
        Self::from_config(PolicyConfig::parse(content)?)
    }

    /// Create a registry from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, PolicyConfigError> {
        Self::from_config(PolicyConfig::from_file(path)?)
    }

    /// Create an empty registry (useful for testing).
    pub fn empty() -> Self {
        Self {
            principals: HashMap::new(),
            grants: Vec::new(),
            engine: EngineConfig::default(),
        }
    }

    /// The `[engine]` settings this registry was loaded with.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Explicitly configured principal IDs.
    pub fn principal_ids(&self) -> impl Iterator<Item = &str> {
        self.principals.keys().map(String::as_str)
    }

    /// Build an engine over this registry using its `[engine]` settings.
    pub fn into_engine(self) -> AuthorizationEngine<PolicyRegistry, StrategyKind> {
        let strategy = self.engine.strategy;
        let mode = self.engine.mode();
        AuthorizationEngine::new(self, strategy, mode)
    }
}

fn build_capabilities(
    owner: &str,
    system: bool,
    entries: &[CapabilityConfig],
    factory: &CapabilityFactory,
) -> Result<CapabilitySet, PolicyConfigError> {
    let mut set = if system {
        CapabilitySet::system()
    } else {
        CapabilitySet::new()
    };

    for entry in entries {
        let real = factory
            .construct(&entry.kind, &entry.parameters.to_vec())
            .map_err(|source| PolicyConfigError::Construction {
                owner: owner.to_string(),
                source,
            })?;
        set.insert(if entry.guest {
            Capability::guest(real)
        } else {
            real
        });
    }

    Ok(set)
}

impl PrincipalRegistry for PolicyRegistry {
    fn capabilities_of(&self, principal: &PrincipalId) -> CapabilitySet {
        let mut set = self
            .principals
            .get(principal.as_str())
            .map(|entry| entry.capabilities.clone())
            .unwrap_or_default();

        for grant in &self.grants {
            if grant
                .patterns
                .iter()
                .any(|pattern| matches_pattern(pattern, principal.as_str()))
            {
                set.extend(grant.capabilities.iter().cloned());
            }
        }

        set
    }

    fn origin_of(&self, principal: &PrincipalId) -> String {
        self.principals
            .get(principal.as_str())
            .and_then(|entry| entry.origin.clone())
            .unwrap_or_else(|| principal.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guestpass_engine::ConstructionError;

    fn test_registry() -> PolicyRegistry {
        let toml = r#"
[engine]
log_mode = false
strategy = "guest-aware"

[[principals]]
id = "module:app"
origin = "file:/opt/app/app.jar"
capabilities = [
    { kind = "file", parameters = ["target/foo", "read"], guest = true },
    { kind = "runtime", parameters = "setIO" },
]

[[principals]]
id = "module:db"
capabilities = [
    { kind = "file", parameters = "target/*|read,write" },
]

[[grants]]
principals = ["framework:*"]
system = true

[[grants]]
principals = ["module:*"]
capabilities = [
    { kind = "logging", parameters = ["control"] },
]
        "#;

        PolicyRegistry::from_toml(toml).expect("Failed to parse test policy")
    }

    fn id(s: &str) -> PrincipalId {
        PrincipalId::from(s)
    }

    #[test]
    fn test_explicit_capabilities() {
        let registry = test_registry();
        let caps = registry.capabilities_of(&id("module:app"));
        assert!(caps.implies(&Capability::named("runtime", "setIO")));
        assert!(caps.implies(&Capability::guest(Capability::scoped("file", "target/foo", "read"))));
        assert!(!caps.implies(&Capability::scoped("file", "target/foo", "read")));
    }

    #[test]
    fn test_pattern_grants_are_merged() {
        let registry = test_registry();
        let caps = registry.capabilities_of(&id("module:db"));
        assert!(caps.implies(&Capability::named("logging", "control")));
        assert!(caps.implies(&Capability::scoped("file", "target/bar", "write")));

        // unknown principals still receive matching grants
        let caps = registry.capabilities_of(&id("module:new"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_system_grant() {
        let registry = test_registry();
        assert!(registry.capabilities_of(&id("framework:web")).is_system());
        assert!(!registry.capabilities_of(&id("module:app")).is_system());
    }

    #[test]
    fn test_unknown_principal_holds_nothing() {
        let registry = test_registry();
        assert!(registry.capabilities_of(&id("tenant:ghost")).is_empty());
    }

    #[test]
    fn test_origin() {
        let registry = test_registry();
        assert_eq!(registry.origin_of(&id("module:app")), "file:/opt/app/app.jar");
        assert_eq!(registry.origin_of(&id("module:db")), "module:db");
        assert_eq!(registry.origin_of(&id("tenant:ghost")), "tenant:ghost");
    }

    #[test]
    fn test_engine_settings() {
        let registry = test_registry();
        assert_eq!(registry.engine_config().strategy, StrategyKind::GuestAware);
        let engine = registry.into_engine();
        assert!(engine.mode().is_enforcing());
    }

    #[test]
    fn test_bad_capability_fails_load() {
        let result = PolicyRegistry::from_toml(
            r#"
[[principals]]
id = "module:app"
capabilities = [{ kind = "all", parameters = "one|two|three" }]
            "#,
        );
        match result {
            Err(PolicyConfigError::Construction { owner, source }) => {
                assert_eq!(owner, "module:app");
                assert!(matches!(source, ConstructionError::NoSuitableConstructor { .. }));
            }
            _ => panic!("expected a construction error"),
        }
    }

    #[test]
    fn test_custom_factory() {
        let mut factory = CapabilityFactory::new();
        factory.register("tenant", &[guestpass_engine::ParamType::Str], |args| {
            Ok(Capability::named("tenant", args[0].clone()))
        });
        let config = PolicyConfig::parse(
            r#"
[[principals]]
id = "tenant:acme"
capabilities = [{ kind = "tenant", parameters = ["billing"] }]
            "#,
        )
        .expect("policy parses");
        let registry =
            PolicyRegistry::from_config_with_factory(config, &factory).expect("registry loads");
        assert!(registry
            .capabilities_of(&id("tenant:acme"))
            .implies(&Capability::named("tenant", "billing")));
    }

    #[test]
    fn test_empty() {
        let registry = PolicyRegistry::empty();
        assert_eq!(registry.principal_ids().count(), 0);
    }
}
