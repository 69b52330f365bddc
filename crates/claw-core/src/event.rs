// ── Remote-control events ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single key press as reported by an input source.
///
/// Built by a listener the moment a raw line is parsed and consumed once by
/// the dispatcher. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    code: String,
    repeat: u32,
    key: String,
    source: String,
    time: DateTime<Utc>,
}

impl RemoteCommand {
    pub fn new(
        code: impl Into<String>,
        repeat: u32,
        key: impl Into<String>,
        source: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            repeat,
            key: key.into(),
            source: source.into(),
            time,
        }
    }

    /// Raw protocol code (e.g. `0000000000f40bf0`).
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Repeat counter; `0` for the initial press.
    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    /// Logical key name (e.g. `KEY_VOLUMEUP`).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of the remote that produced the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Capture time, taken before the read that produced the line.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn is_repeat(&self) -> bool {
        self.repeat > 0
    }
}
