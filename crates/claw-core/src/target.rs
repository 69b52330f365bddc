// ── Target contract ──

use async_trait::async_trait;

use crate::command::CommandMap;
use crate::error::CoreError;

/// A controllable device.
///
/// Targets live for the whole process. State a target learns in the
/// background (a discovered address, a session) must sit behind the
/// target's own lock, and `send_command` must fail with
/// [`CoreError::TargetUnavailable`] rather than wait when that state is
/// not there yet.
#[async_trait]
pub trait Target: Send + Sync {
    /// Instance name from the configuration.
    fn name(&self) -> &str;

    /// The commands this target understands. An empty map means the
    /// target validates its own arguments.
    fn commands(&self) -> &CommandMap;

    /// Perform a command. `args` have already been validated against
    /// [`commands`](Self::commands) when that map is non-empty.
    async fn send_command(&self, command: &str, args: &[String]) -> Result<(), CoreError>;

    /// Release resources. Safe to call more than once.
    async fn stop(&self) -> Result<(), CoreError>;
}
