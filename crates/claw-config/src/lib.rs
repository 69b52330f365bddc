//! Configuration for the claw router.
//!
//! A TOML file declares listeners, targets and routes; `CLAW_`-prefixed
//! environment variables override it (`__` separates nesting levels, e.g.
//! `CLAW_TARGETS__RECEIVER__PARAMS__HOST`). The result translates into the
//! plugin specs and route table `claw_core` works with.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use claw_core::{ANY_SOURCE, Action, Params, PluginSpec, RouteTable};

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "CLAW_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Input sources by instance name.
    #[serde(default)]
    pub listeners: BTreeMap<String, PluginEntry>,

    /// Controllable devices by instance name.
    #[serde(default)]
    pub targets: BTreeMap<String, PluginEntry>,

    /// Key-to-command bindings.
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// One `[listeners.NAME]` or `[targets.NAME]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PluginEntry {
    /// Registered plugin type, e.g. `lircsocket` or `onkyo`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

/// A scalar parameter. Plugins receive every value as a string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

/// One `[[routes]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Remote name, or `*` for any remote.
    #[serde(default = "default_source")]
    pub source: String,

    pub key: String,
    pub target: String,
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Also fire on auto-repeat events.
    #[serde(default = "default_repeat")]
    pub repeat: bool,
}

fn default_source() -> String {
    ANY_SOURCE.into()
}
fn default_repeat() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "claw", "claw").map_or_else(
        || PathBuf::from("/etc/claw/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
}

/// Load and validate the configuration at `path`, with environment
/// overrides applied.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let config: Config = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Parse a TOML document without environment overrides or validation.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(Figment::from(Toml::string(source)).extract()?)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Structural checks that do not need the plugin registries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listeners.is_empty() {
            return Err(ConfigError::Validation {
                field: "listeners".into(),
                reason: "at least one listener must be configured".into(),
            });
        }
        for (section, entries) in [("listeners", &self.listeners), ("targets", &self.targets)] {
            if let Some((name, _)) = entries.iter().find(|(_, e)| e.kind.trim().is_empty()) {
                return Err(ConfigError::Validation {
                    field: format!("{section}.{name}.type"),
                    reason: "must not be empty".into(),
                });
            }
        }
        for (idx, route) in self.routes.iter().enumerate() {
            if route.key.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("routes[{idx}].key"),
                    reason: "must not be empty".into(),
                });
            }
            if !self.targets.contains_key(&route.target) {
                return Err(ConfigError::Validation {
                    field: format!("routes[{idx}].target"),
                    reason: format!("no target named '{}'", route.target),
                });
            }
        }
        Ok(())
    }

    // ── Translation to core types ───────────────────────────────────

    pub fn listener_specs(&self) -> BTreeMap<String, PluginSpec> {
        specs(&self.listeners)
    }

    pub fn target_specs(&self) -> BTreeMap<String, PluginSpec> {
        specs(&self.targets)
    }

    /// Later routes for the same `(source, key)` replace earlier ones.
    pub fn route_table(&self) -> RouteTable {
        let mut table = RouteTable::new();
        for route in &self.routes {
            table.insert(
                route.source.clone(),
                route.key.clone(),
                Action::new(route.target.clone(), route.command.clone())
                    .with_args(route.args.iter().cloned())
                    .with_repeat(route.repeat),
            );
        }
        table
    }
}

impl PluginEntry {
    pub fn to_spec(&self) -> PluginSpec {
        let params: Params = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        PluginSpec::new(self.kind.clone(), params)
    }
}

fn specs(entries: &BTreeMap<String, PluginEntry>) -> BTreeMap<String, PluginSpec> {
    entries
        .iter()
        .map(|(name, entry)| (name.clone(), entry.to_spec()))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use claw_core::{RemoteCommand, RouteResolver};
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
[listeners.lircd]
type = "lircsocket"
params = { path = "/var/run/lirc/lircd" }

[targets.receiver]
type = "onkyo"
params = { host = "192.168.1.20", port = 60128 }

[[routes]]
key = "KEY_VOLUMEUP"
target = "receiver"
command = "VolumeUp"

[[routes]]
source = "den"
key = "KEY_1"
target = "receiver"
command = "Volume"
args = ["50%"]
repeat = false
"#;

    #[test]
    fn parses_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.routes[0].source, "*");
        assert!(config.routes[0].repeat);
        assert!(!config.routes[1].repeat);

        let targets = config.target_specs();
        let receiver = &targets["receiver"];
        assert_eq!(receiver.kind, "onkyo");
        assert_eq!(receiver.params["port"], "60128");
        assert_eq!(receiver.params["host"], "192.168.1.20");
    }

    #[test]
    fn route_table_honors_source() {
        let table = Config::from_toml(SAMPLE).unwrap().route_table();
        let event = |source: &str, key: &str| {
            RemoteCommand::new("00", 0, key, source, Utc::now())
        };
        let any = table.resolve(&event("kitchen", "KEY_VOLUMEUP")).unwrap();
        assert_eq!(any.command, "VolumeUp");
        let den = table.resolve(&event("den", "KEY_1")).unwrap();
        assert_eq!(den.args, vec!["50%".to_owned()]);
        assert!(!den.repeat);
        assert!(table.resolve(&event("kitchen", "KEY_1")).is_none());
    }

    #[test]
    fn no_listeners_is_invalid() {
        let err = Config::from_toml("").unwrap().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid listeners: at least one listener must be configured"
        );
    }

    #[test]
    fn route_to_unknown_target_is_invalid() {
        let config = Config::from_toml(
            r#"
[listeners.lircd]
type = "lircsocket"

[[routes]]
key = "KEY_POWER"
target = "tv"
command = "PowerOn"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routes[0].target"), "{err}");
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let rendered = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&rendered).unwrap(), config);
    }
}
