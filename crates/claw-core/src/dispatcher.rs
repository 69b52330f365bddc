// ── Dispatcher ──
//
// Owns the configured targets and turns each event into at most one target
// command. Routing is pluggable through `RouteResolver`; `RouteTable` is the
// implementation the binary builds from its config file.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::event::RemoteCommand;
use crate::registry::{PluginSpec, TargetRegistry};
use crate::target::Target;

/// Source name that matches every remote.
pub const ANY_SOURCE: &str = "*";

// ── Routing ──────────────────────────────────────────────────────────

/// What to do when a routed key is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub target: String,
    pub command: String,
    pub args: Vec<String>,
    /// Whether auto-repeat events (`repeat > 0`) also trigger the action.
    pub repeat: bool,
}

impl Action {
    pub fn new(target: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            command: command.into(),
            args: Vec::new(),
            repeat: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}

/// Maps an event to an action.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, event: &RemoteCommand) -> Option<&Action>;
}

/// `(source, key)` routing table with a `*` source fallback.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<(String, String), Action>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the action for `(source, key)`.
    pub fn insert(&mut self, source: impl Into<String>, key: impl Into<String>, action: Action) {
        self.routes.insert((source.into(), key.into()), action);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every action in the table.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.routes.values()
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, event: &RemoteCommand) -> Option<&Action> {
        let key = event.key().to_owned();
        self.routes
            .get(&(event.source().to_owned(), key.clone()))
            .or_else(|| self.routes.get(&(ANY_SOURCE.to_owned(), key)))
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// No route for this key; dropped.
    Unmapped,
    /// Routed, but the route ignores auto-repeat.
    RepeatSuppressed,
    /// The target accepted the command.
    Sent { target: String, command: String },
}

pub struct Dispatcher {
    targets: BTreeMap<String, Arc<dyn Target>>,
    routes: Arc<dyn RouteResolver>,
}

impl Dispatcher {
    /// Build a dispatcher around already constructed targets.
    pub fn new(
        targets: impl IntoIterator<Item = Arc<dyn Target>>,
        routes: Arc<dyn RouteResolver>,
    ) -> Self {
        let targets = targets
            .into_iter()
            .map(|t| (t.name().to_owned(), t))
            .collect();
        Self { targets, routes }
    }

    /// Instantiate one target per config entry. Any unknown type or
    /// rejected parameter set fails the whole setup.
    pub fn setup(
        registry: &TargetRegistry,
        configs: &BTreeMap<String, PluginSpec>,
        routes: Arc<dyn RouteResolver>,
    ) -> Result<Self, CoreError> {
        let mut targets = BTreeMap::new();
        for (name, spec) in configs {
            let target: Arc<dyn Target> = Arc::from(registry.create(name, spec)?);
            debug!(target = %name, kind = %spec.kind, "target created");
            targets.insert(name.clone(), target);
        }
        Ok(Self { targets, routes })
    }

    pub fn target(&self, name: &str) -> Option<&Arc<dyn Target>> {
        self.targets.get(name)
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Route one event.
    ///
    /// Unrouted keys are not errors. A failed send is returned as-is; the
    /// dispatcher never retries.
    pub async fn dispatch(&self, event: &RemoteCommand) -> Result<Dispatch, CoreError> {
        let Some(action) = self.routes.resolve(event) else {
            trace!(source = %event.source(), key = %event.key(), "no route");
            return Ok(Dispatch::Unmapped);
        };
        if event.is_repeat() && !action.repeat {
            trace!(key = %event.key(), repeat = event.repeat(), "repeat suppressed");
            return Ok(Dispatch::RepeatSuppressed);
        }
        self.send(&action.target, &action.command, &action.args)
            .await?;
        Ok(Dispatch::Sent {
            target: action.target.clone(),
            command: action.command.clone(),
        })
    }

    /// Check `command` and `args` against the target's vocabulary and
    /// return the normalized arguments. Nothing is sent.
    pub fn validate(&self, target: &str, command: &str, args: &[String]) -> Result<Vec<String>, CoreError> {
        let handle = self.lookup(target)?;
        let vocabulary = handle.commands();
        if vocabulary.is_empty() {
            return Ok(args.to_vec());
        }
        let descriptor = vocabulary
            .get(command)
            .ok_or_else(|| CoreError::UnknownCommand {
                target: target.to_owned(),
                command: command.to_owned(),
            })?;
        descriptor
            .validate_args(args)
            .map_err(|source| CoreError::InvalidArguments {
                target: target.to_owned(),
                command: command.to_owned(),
                source,
            })
    }

    /// Validate `args` against the target's vocabulary and send.
    pub async fn send(&self, target: &str, command: &str, args: &[String]) -> Result<(), CoreError> {
        let args = self.validate(target, command, args)?;
        debug!(target, command, ?args, "sending command");
        self.lookup(target)?.send_command(command, &args).await
    }

    fn lookup(&self, target: &str) -> Result<&Arc<dyn Target>, CoreError> {
        self.targets
            .get(target)
            .ok_or_else(|| CoreError::UnknownTarget {
                target: target.to_owned(),
            })
    }

    /// Stop every target. Failures are logged, not returned.
    pub async fn stop(&self) {
        for (name, target) in &self.targets {
            if let Err(e) = target.stop().await {
                warn!(target = %name, error = %e, "target stop failed");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
