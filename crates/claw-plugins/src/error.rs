use claw_core::CoreError;
use thiserror::Error;

/// Protocol-level failures raised inside the plugins.
///
/// Plugins work in terms of this type and convert to [`CoreError`] at the
/// trait boundary, attaching the instance name.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level failure (connect refused, broken pipe, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Operation did not complete in time.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-success HTTP status from a device.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// A device answered with something we cannot decode.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed MAC address for wake-on-LAN.
    #[error("Invalid MAC address '{0}'")]
    InvalidMac(String),

    // ── Device state ────────────────────────────────────────────────
    /// The device has not been discovered yet.
    #[error("{0}")]
    Unavailable(String),

    /// The command needs configuration this target does not have.
    #[error("{0}")]
    NotConfigured(String),

    /// The target does not support this command.
    #[error("Unsupported command '{0}'")]
    Unsupported(String),
}

impl Error {
    /// Returns `true` if retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) | Self::Timeout { .. } | Self::Unavailable(_) => true,
            _ => false,
        }
    }

    /// Attach the target's instance name and lift into [`CoreError`].
    pub fn for_target(self, target: &str) -> CoreError {
        match self {
            Self::Unavailable(reason) => CoreError::TargetUnavailable {
                target: target.to_owned(),
                reason,
            },
            other => CoreError::TargetFailed {
                target: target.to_owned(),
                message: other.to_string(),
            },
        }
    }

    /// Attach the listener's instance name and lift into [`CoreError`].
    pub fn for_listener(self, listener: &str) -> CoreError {
        CoreError::ListenerRead {
            listener: listener.to_owned(),
            reason: self.to_string(),
        }
    }
}

impl From<Error> for CoreError {
    fn from(err: Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_maps_to_target_unavailable() {
        let err = Error::Unavailable("client not discovered".into()).for_target("htpc");
        assert!(matches!(err, CoreError::TargetUnavailable { .. }));
        assert_eq!(
            err.to_string(),
            "Target 'htpc' is not available: client not discovered"
        );
    }

    #[test]
    fn other_errors_map_to_target_failed() {
        let err = Error::Timeout { timeout_ms: 2000 }.for_target("receiver");
        assert_eq!(
            err.to_string(),
            "Target 'receiver' failed: Timed out after 2000ms"
        );
    }
}
