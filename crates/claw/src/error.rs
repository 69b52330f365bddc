//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError` and `CoreError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use claw_config::ConfigError;
use claw_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found")]
    #[diagnostic(
        code(claw::no_config),
        help(
            "Expected at: {path}\n\
             Pass --config or set CLAW_CONFIG to use another file."
        )
    )]
    NoConfig { path: String },

    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(code(claw::config_invalid))]
    InvalidConfig { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(claw::config))]
    Config(ConfigError),

    #[error("Plugin setup failed")]
    #[diagnostic(
        code(claw::setup),
        help("Check the plugin types and params in the configuration.")
    )]
    Setup {
        #[source]
        source: CoreError,
    },

    // ── Targets ──────────────────────────────────────────────────────

    #[error("Target '{name}' not found")]
    #[diagnostic(
        code(claw::unknown_target),
        help("Configured targets: {available}")
    )]
    UnknownTarget { name: String, available: String },

    #[error("Command rejected")]
    #[diagnostic(
        code(claw::invalid_command),
        help("Run: claw commands <target> to see the accepted commands and values")
    )]
    InvalidCommand {
        #[source]
        source: CoreError,
    },

    // ── Listeners ────────────────────────────────────────────────────

    #[error("Listener failed")]
    #[diagnostic(
        code(claw::listener),
        help("Check that lircd is running and its socket path is correct.")
    )]
    ListenerFailed {
        #[source]
        source: CoreError,
    },

    #[error("All listeners stopped")]
    #[diagnostic(code(claw::stream_closed))]
    StreamClosed,

    // ── Everything else ──────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(claw::core))]
    Core(CoreError),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. }
            | Self::InvalidConfig { .. }
            | Self::Config(_)
            | Self::Setup { .. } => exit_code::CONFIG,
            Self::UnknownTarget { .. } => exit_code::NOT_FOUND,
            Self::InvalidCommand { .. } => exit_code::USAGE,
            Self::ListenerFailed { .. } => exit_code::CONNECTION,
            Self::StreamClosed | Self::Core(_) => exit_code::GENERAL,
        }
    }
}

// ── Error mapping ───────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::InvalidConfig { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            e if e.is_setup_error() => Self::Setup { source: e },
            e @ (CoreError::UnknownCommand { .. }
            | CoreError::InvalidArguments { .. }
            | CoreError::Validation(_)) => Self::InvalidCommand { source: e },
            e @ (CoreError::ListenerConnection { .. } | CoreError::ListenerRead { .. }) => {
                Self::ListenerFailed { source: e }
            }
            other => Self::Core(other),
        }
    }
}
