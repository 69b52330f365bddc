// ── Listener contract ──

use async_trait::async_trait;

use crate::error::CoreError;
use crate::stream::StreamHandle;

/// An input source turning raw external input into
/// [`RemoteCommand`](crate::RemoteCommand)s.
///
/// A listener owns its connection. The [`CommandStream`](crate::CommandStream)
/// drives it by calling [`run`](Self::run) on a dedicated task; `run` is
/// expected to set itself up, emit events through the handle, and keep
/// going until the task is cancelled.
///
/// If the *first* setup attempt inside `run` fails, the listener should
/// report the error and call [`StreamHandle::abort`]: an input that is
/// unavailable from the start is a configuration problem, not a blip.
#[async_trait]
pub trait Listener: Send {
    /// Instance name from the configuration.
    fn name(&self) -> &str;

    /// Establish the connection. Calling it again replaces any existing
    /// connection.
    async fn setup(&mut self) -> Result<(), CoreError>;

    /// Run until cancelled.
    async fn run(&mut self, stream: StreamHandle);
}
