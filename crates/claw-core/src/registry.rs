// ── Plugin registries ──
//
// Maps a configured type name (e.g. "lircsocket", "onkyo") to a factory.
// Registries are ordinary values: built once at startup, then shared
// read-only with whoever instantiates plugins.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::CoreError;
use crate::listener::Listener;
use crate::target::Target;

/// String parameters handed to a plugin factory.
pub type Params = BTreeMap<String, String>;

/// A factory for plugins of one type: `(instance name, params) -> plugin`.
pub type Factory<P> = Arc<dyn Fn(&str, &Params) -> Result<Box<P>, CoreError> + Send + Sync>;

pub type ListenerRegistry = Registry<dyn Listener>;
pub type TargetRegistry = Registry<dyn Target>;

/// Configuration entry for one plugin instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    /// Registered type name.
    pub kind: String,
    pub params: Params,
}

impl PluginSpec {
    pub fn new(kind: impl Into<String>, params: Params) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

/// Type name → factory table.
pub struct Registry<P: ?Sized> {
    /// "listener" or "target"; used in error messages.
    label: &'static str,
    factories: HashMap<String, Factory<P>>,
}

impl<P: ?Sized> Registry<P> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            factories: HashMap::new(),
        }
    }

    /// Register a factory. Each type name may be registered once.
    pub fn register<F>(&mut self, plugin_type: impl Into<String>, factory: F) -> Result<(), CoreError>
    where
        F: Fn(&str, &Params) -> Result<Box<P>, CoreError> + Send + Sync + 'static,
    {
        let plugin_type = plugin_type.into();
        if self.factories.contains_key(&plugin_type) {
            return Err(CoreError::DuplicatePluginType {
                kind: self.label.into(),
                plugin_type,
            });
        }
        self.factories.insert(plugin_type, Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.factories.contains_key(plugin_type)
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate a plugin. The result is constructed but not yet set up.
    pub fn create(&self, name: &str, spec: &PluginSpec) -> Result<Box<P>, CoreError> {
        let factory =
            self.factories
                .get(&spec.kind)
                .ok_or_else(|| CoreError::UnknownPluginType {
                    kind: self.label.into(),
                    plugin_type: spec.kind.clone(),
                })?;
        factory(name, &spec.params)
    }
}

impl ListenerRegistry {
    pub fn listeners() -> Self {
        Self::new("listener")
    }
}

impl TargetRegistry {
    pub fn targets() -> Self {
        Self::new("target")
    }
}

impl<P: ?Sized> fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("label", &self.label)
            .field("types", &self.types())
            .finish()
    }
}

/// Fetch a required parameter or fail with `InvalidParameters`.
pub fn required_param<'a>(
    plugin: &str,
    name: &str,
    params: &'a Params,
    key: &str,
) -> Result<&'a str, CoreError> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::InvalidParameters {
            plugin: plugin.into(),
            name: name.into(),
            reason: format!("missing required parameter '{key}'"),
        })
}

/// Parse an optional parameter, falling back to `default` when absent.
pub fn parsed_param<T>(
    plugin: &str,
    name: &str,
    params: &Params,
    key: &str,
    default: T,
) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match params.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| CoreError::InvalidParameters {
            plugin: plugin.into(),
            name: name.into(),
            reason: format!("parameter '{key}' = '{raw}': {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use async_trait::async_trait;

    use super::*;
    use crate::command::CommandMap;

    struct Dummy {
        name: String,
        commands: CommandMap,
    }

    #[async_trait]
    impl Target for Dummy {
        fn name(&self) -> &str {
            &self.name
        }
        fn commands(&self) -> &CommandMap {
            &self.commands
        }
        async fn send_command(&self, _command: &str, _args: &[String]) -> Result<(), CoreError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn dummy_factory(name: &str, params: &Params) -> Result<Box<dyn Target>, CoreError> {
        required_param("dummy", name, params, "host")?;
        Ok(Box::new(Dummy {
            name: name.into(),
            commands: CommandMap::new(),
        }))
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn create_registered_type() {
        let mut reg = TargetRegistry::targets();
        reg.register("dummy", dummy_factory).unwrap();
        let t = reg
            .create("tv", &PluginSpec::new("dummy", params(&[("host", "x")])))
            .unwrap();
        assert_eq!(t.name(), "tv");
    }

    #[test]
    fn unknown_type_is_an_error() {
        let reg = TargetRegistry::targets();
        let err = reg
            .create("tv", &PluginSpec::new("nope", Params::new()))
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::UnknownPluginType { .. }));
        assert_eq!(err.to_string(), "No target plugin registered under type 'nope'");
    }

    #[test]
    fn factory_rejection_propagates() {
        let mut reg = TargetRegistry::targets();
        reg.register("dummy", dummy_factory).unwrap();
        let err = reg
            .create("tv", &PluginSpec::new("dummy", Params::new()))
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::InvalidParameters { .. }));
        assert!(err.is_setup_error());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = TargetRegistry::targets();
        reg.register("dummy", dummy_factory).unwrap();
        assert!(matches!(
            reg.register("dummy", dummy_factory),
            Err(CoreError::DuplicatePluginType { .. })
        ));
        assert_eq!(reg.types(), vec!["dummy"]);
    }

    #[test]
    fn parsed_param_defaults_and_errors() {
        let p = params(&[("port", "60128"), ("bad", "x")]);
        assert_eq!(parsed_param("t", "n", &p, "port", 1u16).unwrap(), 60128);
        assert_eq!(parsed_param("t", "n", &p, "missing", 7u16).unwrap(), 7);
        assert!(parsed_param("t", "n", &p, "bad", 0u16).is_err());
    }
}
