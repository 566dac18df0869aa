//! Dynamic construction of capabilities from declarative `(kind, parameters)` pairs.
//!
//! Policy files name capabilities by kind plus a list of string parameters.
//! A [`CapabilityFactory`] maps each kind to one or more typed constructors and
//! picks the tightest one that can take the supplied strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::capability::{Capability, parse_actions};
use crate::error::ConstructionError;
use crate::guest::GuestCapability;

/// Parameter type declared by a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Integer,
    Flag,
}

impl ParamType {
    fn accepts_string(self) -> bool {
        matches!(self, ParamType::Str)
    }
}

type BuildFn = Arc<dyn Fn(&[String]) -> Result<Capability, String> + Send + Sync>;

/// One way of building a capability of a given kind.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<ParamType>,
    build: BuildFn,
}

impl Constructor {
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Can this constructor take `count` strings, padding the rest with `""`?
    fn accepts_strings(&self, count: usize) -> bool {
        self.arity() >= count && self.params.iter().all(|p| p.accepts_string())
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Registry of capability constructors, keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct CapabilityFactory {
    kinds: HashMap<String, Vec<Constructor>>,
}

impl CapabilityFactory {
    /// An empty factory with no kinds registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with the built-in kinds: `all`, `runtime`, `logging`, `file` and `net`.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();

        factory
            .register("all", &[], |_| Ok(Capability::All))
            .register("all", &[ParamType::Str, ParamType::Str], |_| {
                Ok(Capability::All)
            })
            .register("runtime", &[ParamType::Str], |args| {
                named("runtime", &args[0])
            })
            .register("runtime", &[ParamType::Str, ParamType::Str], |args| {
                named("runtime", &args[0])
            })
            .register("logging", &[ParamType::Str, ParamType::Str], |args| {
                if args[0] != "control" {
                    return Err(format!("logging name must be 'control', got '{}'", args[0]));
                }
                if !args[1].is_empty() {
                    return Err(format!("logging takes no actions, got '{}'", args[1]));
                }
                named("logging", &args[0])
            })
            .register("file", &[ParamType::Str, ParamType::Str], |args| {
                scoped("file", &args[0], &args[1], FILE_ACTIONS)
            })
            .register("net", &[ParamType::Str, ParamType::Str], |args| {
                scoped("net", &args[0], &args[1], NET_ACTIONS)
            });

        factory
    }

    /// Register a constructor for `kind`.
    ///
    /// `build` receives exactly `params.len()` strings. Constructors taking
    /// non-string parameters are recorded but never selected for declarative
    /// construction.
    pub fn register<F>(&mut self, kind: impl Into<String>, params: &[ParamType], build: F) -> &mut Self
    where
        F: Fn(&[String]) -> Result<Capability, String> + Send + Sync + 'static,
    {
        self.kinds.entry(kind.into()).or_default().push(Constructor {
            params: params.to_vec(),
            build: Arc::new(build),
        });
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Choose the constructor with the fewest parameters that can still
    /// take `count` strings. Earlier registrations win ties.
    pub fn best_fit(&self, kind: &str, count: usize) -> Option<&Constructor> {
        self.kinds
            .get(kind)?
            .iter()
            .filter(|c| c.accepts_strings(count))
            .fold(None, |best: Option<&Constructor>, c| match best {
                Some(b) if b.arity() <= c.arity() => Some(b),
                _ => Some(c),
            })
    }

    /// Build a capability from its kind and ordered string parameters.
    ///
    /// Trailing parameters the chosen constructor needs beyond those supplied
    /// are filled with empty strings.
    pub fn construct(&self, kind: &str, parameters: &[String]) -> Result<Capability, ConstructionError> {
        if !self.kinds.contains_key(kind) {
            return Err(ConstructionError::UnknownKind {
                kind: kind.to_string(),
            });
        }

        let constructor = self.best_fit(kind, parameters.len()).ok_or_else(|| {
            ConstructionError::NoSuitableConstructor {
                kind: kind.to_string(),
                parameters: parameters.to_vec(),
            }
        })?;

        let mut args = parameters.to_vec();
        args.resize(constructor.arity(), String::new());

        (constructor.build)(args.as_slice()).map_err(|reason| ConstructionError::InstantiationFailed {
            kind: kind.to_string(),
            reason,
        })
    }

    /// Like [`construct`](Self::construct), taking parameters in the
    /// pipe-separated policy form `a|b|c`.
    pub fn construct_piped(&self, kind: &str, parameters: &str) -> Result<Capability, ConstructionError> {
        self.construct(kind, &Self::parse_parameters(parameters))
    }

    /// Build a guest capability wrapping the described real capability.
    pub fn guest(&self, kind: &str, parameters: &[String]) -> Result<GuestCapability, ConstructionError> {
        self.construct(kind, parameters).map(GuestCapability::new)
    }

    /// Split the pipe-separated parameter form. Empty text means no parameters.
    pub fn parse_parameters(raw: &str) -> Vec<String> {
        if raw.is_empty() {
            return Vec::new();
        }
        raw.split('|').map(str::to_string).collect()
    }
}

const FILE_ACTIONS: &[&str] = &["read", "write", "execute", "delete", "readlink"];
const NET_ACTIONS: &[&str] = &["connect", "listen", "accept", "resolve"];

fn named(kind: &str, name: &str) -> Result<Capability, String> {
    if name.is_empty() {
        return Err("name can't be empty".to_string());
    }
    Ok(Capability::named(kind, name))
}

fn scoped(kind: &str, target: &str, actions: &str, allowed: &[&str]) -> Result<Capability, String> {
    if target.is_empty() {
        return Err("target can't be empty".to_string());
    }
    let parsed = parse_actions(actions);
    if parsed.is_empty() {
        return Err(format!("invalid actions '{actions}'"));
    }
    if let Some(bad) = parsed.iter().find(|a| !allowed.contains(&a.as_str())) {
        return Err(format!("invalid action '{bad}'"));
    }
    Ok(Capability::Scoped {
        kind: kind.to_string(),
        target: target.to_string(),
        actions: parsed,
    })
}
