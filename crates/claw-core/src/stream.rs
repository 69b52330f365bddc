// ── Command stream ──
//
// Fan-in of every registered listener into one consumer. Each listener runs
// on its own task and pushes into a shared unbounded channel, so events from
// one listener keep their order while events from different listeners
// interleave as they arrive. Errors travel on a separate channel and land
// in a "last error" slot the consumer inspects between events.

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::event::RemoteCommand;
use crate::listener::Listener;

// ── StreamHandle ─────────────────────────────────────────────────────

/// The listener side of a [`CommandStream`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    events: mpsc::UnboundedSender<RemoteCommand>,
    errors: mpsc::UnboundedSender<CoreError>,
    fatal: CancellationToken,
}

impl StreamHandle {
    /// Publish an event. Returns `false` once the stream has been dropped.
    pub fn emit(&self, event: RemoteCommand) -> bool {
        self.events.send(event).is_ok()
    }

    /// Report a non-fatal error to the consumer's side channel.
    pub fn report(&self, error: CoreError) {
        // No receiver means the stream is gone; nobody left to tell.
        let _ = self.errors.send(error);
    }

    /// Shut the whole stream down. The consumer's next call to
    /// [`CommandStream::next`] returns `None`.
    pub fn abort(&self) {
        self.fatal.cancel();
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_cancelled()
    }
}

// ── CommandStream ────────────────────────────────────────────────────

/// Aggregates listeners into one ordered event sequence.
///
/// `next` takes `&mut self`, so there is exactly one consumer. Dropping the
/// stream aborts every listener task; [`close`](Self::close) does the same
/// and waits for them to finish.
pub struct CommandStream {
    handle: StreamHandle,
    events: mpsc::UnboundedReceiver<RemoteCommand>,
    errors: mpsc::UnboundedReceiver<CoreError>,
    last_error: Option<CoreError>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl CommandStream {
    pub fn new() -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        Self {
            handle: StreamHandle {
                events: event_tx,
                errors: error_tx,
                fatal: CancellationToken::new(),
            },
            events,
            errors,
            last_error: None,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// A handle for feeding this stream from outside a registered listener.
    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    /// Register a listener and start it on its own task immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_listener(&mut self, mut listener: Box<dyn Listener>) {
        let handle = self.handle.clone();
        let cancel = self.cancel.clone();
        let name = listener.name().to_owned();
        debug!(listener = %name, "starting listener");

        self.tasks.spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => debug!(listener = %name, "listener cancelled"),
                () = listener.run(handle) => debug!(listener = %name, "listener exited"),
            }
        });
    }

    /// Number of listener tasks still owned by the stream.
    pub fn listener_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once a listener has aborted the stream or the stream
    /// has been closed. Errors that arrive in the meantime are stored for
    /// [`error`](Self::error) and never hold back an event.
    pub async fn next(&mut self) -> Option<RemoteCommand> {
        loop {
            if self.is_fatal() || self.cancel.is_cancelled() {
                return None;
            }
            tokio::select! {
                biased;
                () = self.handle.fatal.cancelled() => return None,
                () = self.cancel.cancelled() => return None,
                Some(err) = self.errors.recv() => self.record(err),
                Some(event) = self.events.recv() => return Some(event),
                else => return None,
            }
        }
    }

    // ── Error side channel ───────────────────────────────────────────

    pub fn has_error(&self) -> bool {
        self.last_error.is_some() || !self.errors.is_empty()
    }

    /// The most recent listener error, if any. Errors still queued on the
    /// side channel are picked up first, so this agrees with
    /// [`has_error`](Self::has_error).
    pub fn error(&mut self) -> Option<&CoreError> {
        self.drain_errors();
        self.last_error.as_ref()
    }

    /// Remove and return the most recent listener error.
    pub fn take_error(&mut self) -> Option<CoreError> {
        self.drain_errors();
        self.last_error.take()
    }

    pub fn clear_error(&mut self) {
        self.drain_errors();
        self.last_error = None;
    }

    pub fn is_fatal(&self) -> bool {
        self.handle.is_fatal()
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop every listener and wait for their tasks to end.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Some(e) = joined.err().filter(JoinError::is_panic) {
                warn!(error = %e, "listener task panicked");
            }
        }
        debug!("command stream closed");
    }

    fn record(&mut self, err: CoreError) {
        debug!(error = %err, "listener reported error");
        self.last_error = Some(err);
    }

    fn drain_errors(&mut self) {
        while let Ok(err) = self.errors.try_recv() {
            self.record(err);
        }
    }
}

impl Default for CommandStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        // JoinSet aborts whatever is still running when it drops.
    }
}
