// ── Core error types ──
//
// Errors surfaced by the routing pipeline. Plugin crates translate their
// transport-level failures (socket, HTTP, UDP) into these variants so the
// dispatcher and the binary only ever see one error type.

use thiserror::Error;

use crate::validation::ValidationError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Plugin construction ──────────────────────────────────────────
    #[error("No {kind} plugin registered under type '{plugin_type}'")]
    UnknownPluginType { kind: String, plugin_type: String },

    #[error("A {kind} plugin is already registered under type '{plugin_type}'")]
    DuplicatePluginType { kind: String, plugin_type: String },

    #[error("Invalid parameters for {plugin} '{name}': {reason}")]
    InvalidParameters {
        plugin: String,
        name: String,
        reason: String,
    },

    // ── Listener errors ──────────────────────────────────────────────
    #[error("Listener '{listener}' cannot connect: {reason}")]
    ListenerConnection { listener: String, reason: String },

    #[error("Listener '{listener}' read failed: {reason}")]
    ListenerRead { listener: String, reason: String },

    // ── Routing errors ───────────────────────────────────────────────
    #[error("Route refers to unknown target '{target}'")]
    UnknownTarget { target: String },

    #[error("Target '{target}' has no command '{command}'")]
    UnknownCommand { target: String, command: String },

    #[error("Invalid arguments for {target}.{command}: {source}")]
    InvalidArguments {
        target: String,
        command: String,
        #[source]
        source: ValidationError,
    },

    // ── Target errors ────────────────────────────────────────────────
    #[error("Target '{target}' is not available: {reason}")]
    TargetUnavailable { target: String, reason: String },

    #[error("Target '{target}' failed: {message}")]
    TargetFailed { target: String, message: String },

    // ── Vocabulary documents ─────────────────────────────────────────
    #[error("Invalid command vocabulary: {message}")]
    Vocabulary { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures that should stop the process at setup
    /// time rather than be logged and skipped.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPluginType { .. }
                | Self::DuplicatePluginType { .. }
                | Self::InvalidParameters { .. }
                | Self::Vocabulary { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Vocabulary {
            message: err.to_string(),
        }
    }
}
