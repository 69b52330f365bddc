//! `lircsocket` listener.
//!
//! Reads key presses from an `lircd` unix socket. Each line has the form
//!
//! ```text
//! 0000000000f40bf0 00 KEY_VOLUMEUP living-room
//! ```
//!
//! i.e. `CODE REPEAT KEY SOURCE`, with `REPEAT` in hex. Malformed lines are
//! logged and skipped. When `lircd` goes away the listener keeps trying to
//! reconnect; only a socket that is unreachable at startup is fatal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::{CoreError, Listener, Params, RemoteCommand, StreamHandle};
use claw_core::{parsed_param, required_param};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, error, info, trace, warn};

use crate::error::Error;

pub const PLUGIN_TYPE: &str = "lircsocket";

const DEFAULT_SHORT_BACKOFF_MS: u64 = 1000;
const DEFAULT_LONG_BACKOFF_MS: u64 = 3000;

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;

// ── Line parsing ─────────────────────────────────────────────────────

/// Parse one `lircd` broadcast line. `time` is attached verbatim.
pub fn parse_line(line: &str, time: DateTime<Utc>) -> Result<RemoteCommand, Error> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [code, repeat, key, source] = fields.as_slice() else {
        return Err(Error::Protocol(format!(
            "expected 4 fields, got {}: {:?}",
            fields.len(),
            line.trim_end()
        )));
    };
    let repeat = u32::from_str_radix(repeat, 16)
        .map_err(|e| Error::Protocol(format!("repeat count '{repeat}': {e}")))?;
    Ok(RemoteCommand::new(*code, repeat, *key, *source, time))
}

// ── Listener ─────────────────────────────────────────────────────────

pub struct LircSocketListener {
    name: String,
    path: PathBuf,
    short_backoff: Duration,
    long_backoff: Duration,
    reader: Option<Reader>,
}

impl fmt::Debug for LircSocketListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LircSocketListener")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("connected", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

impl LircSocketListener {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            short_backoff: Duration::from_millis(DEFAULT_SHORT_BACKOFF_MS),
            long_backoff: Duration::from_millis(DEFAULT_LONG_BACKOFF_MS),
            reader: None,
        }
    }

    /// Delay before reconnecting after EOF, and after a failed read.
    pub fn with_short_backoff(mut self, backoff: Duration) -> Self {
        self.short_backoff = backoff;
        self
    }

    /// Delay between failed reconnect attempts.
    pub fn with_long_backoff(mut self, backoff: Duration) -> Self {
        self.long_backoff = backoff;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Factory registered under [`PLUGIN_TYPE`].
    ///
    /// Params: `path` (required), `short_backoff_ms`, `long_backoff_ms`.
    pub fn create(name: &str, params: &Params) -> Result<Box<dyn Listener>, CoreError> {
        let path = required_param(PLUGIN_TYPE, name, params, "path")?;
        let short = parsed_param(
            PLUGIN_TYPE,
            name,
            params,
            "short_backoff_ms",
            DEFAULT_SHORT_BACKOFF_MS,
        )?;
        let long = parsed_param(
            PLUGIN_TYPE,
            name,
            params,
            "long_backoff_ms",
            DEFAULT_LONG_BACKOFF_MS,
        )?;
        Ok(Box::new(
            Self::new(name, path)
                .with_short_backoff(Duration::from_millis(short))
                .with_long_backoff(Duration::from_millis(long)),
        ))
    }

    /// Keep calling `setup` until it succeeds.
    async fn reconnect(&mut self, stream: &StreamHandle) {
        tokio::time::sleep(self.short_backoff).await;
        loop {
            match self.setup().await {
                Ok(()) => {
                    info!(listener = %self.name, "reconnected to lircd");
                    return;
                }
                Err(e) => {
                    warn!(
                        listener = %self.name,
                        error = %e,
                        retry_ms = u64::try_from(self.long_backoff.as_millis()).unwrap_or(u64::MAX),
                        "reconnect failed"
                    );
                    stream.report(e);
                    tokio::time::sleep(self.long_backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl Listener for LircSocketListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self) -> Result<(), CoreError> {
        debug!(listener = %self.name, path = %self.path.display(), "opening socket");
        let conn = UnixStream::connect(&self.path)
            .await
            .map_err(|e| CoreError::ListenerConnection {
                listener: self.name.clone(),
                reason: format!("{}: {e}", self.path.display()),
            })?;
        self.reader = Some(Box::new(BufReader::new(conn)));
        Ok(())
    }

    async fn run(&mut self, stream: StreamHandle) {
        if let Err(e) = self.setup().await {
            error!(listener = %self.name, error = %e, "initial setup failed");
            stream.report(e);
            stream.abort();
            return;
        }
        self.read_loop(&stream).await;
    }
}

impl LircSocketListener {
    /// Read lines until the stream goes away, reconnecting on EOF.
    async fn read_loop(&mut self, stream: &StreamHandle) {
        let mut line = Vec::new();
        loop {
            let Some(reader) = self.reader.as_mut() else {
                self.reconnect(stream).await;
                continue;
            };

            line.clear();
            let now = Utc::now();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => {
                    warn!(listener = %self.name, "socket closed by lircd");
                    self.reader = None;
                    self.reconnect(stream).await;
                }
                Ok(_) => {
                    let parsed = std::str::from_utf8(&line)
                        .map_err(|e| Error::Protocol(format!("line is not valid UTF-8: {e}")))
                        .and_then(|text| parse_line(text, now));
                    match parsed {
                        Ok(event) => {
                            trace!(
                                listener = %self.name,
                                key = %event.key(),
                                source = %event.source(),
                                repeat = event.repeat(),
                                "key press"
                            );
                            if !stream.emit(event) {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(listener = %self.name, error = %e, "discarding malformed line");
                        }
                    }
                }
                Err(e) => {
                    error!(listener = %self.name, error = %e, "read failed");
                    stream.report(Error::Io(e).for_listener(&self.name));
                    tokio::time::sleep(self.short_backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use claw_core::CommandStream;
    use tokio::io::{AsyncRead, ReadBuf};

    use super::*;

    /// Hands out one scripted chunk or error per read, then stays pending.
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl AsyncRead for Scripted {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf.put_slice(&bytes);
                    Poll::Ready(Ok(()))
                }
                Some(Err(e)) => Poll::Ready(Err(e)),
                None => Poll::Pending,
            }
        }
    }

    #[test]
    fn parses_well_formed_line() {
        let now = Utc::now();
        let event = parse_line("0000000000f40bf0 1a KEY_VOLUMEUP living-room\n", now).unwrap();
        assert_eq!(event.code(), "0000000000f40bf0");
        assert_eq!(event.repeat(), 26);
        assert_eq!(event.key(), "KEY_VOLUMEUP");
        assert_eq!(event.source(), "living-room");
        assert_eq!(event.time(), now);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let now = Utc::now();
        assert!(parse_line("0000000000f40bf0 00 KEY_POWER\n", now).is_err());
        assert!(parse_line("a 00 KEY_POWER remote extra\n", now).is_err());
        assert!(parse_line("\n", now).is_err());
    }

    #[test]
    fn rejects_non_hex_repeat() {
        assert!(parse_line("0000 xx KEY_POWER remote", Utc::now()).is_err());
    }

    #[test]
    fn factory_requires_path() {
        let err = LircSocketListener::create("lircd", &Params::new())
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::InvalidParameters { .. }));
    }

    #[test]
    fn factory_reads_backoffs() {
        let params: Params = [
            ("path".to_owned(), "/run/lirc/lircd".to_owned()),
            ("short_backoff_ms".to_owned(), "5".to_owned()),
        ]
        .into_iter()
        .collect();
        let listener = LircSocketListener::create("lircd", &params).unwrap();
        assert_eq!(listener.name(), "lircd");

        let bad: Params = [
            ("path".to_owned(), "/run/lirc/lircd".to_owned()),
            ("long_backoff_ms".to_owned(), "soon".to_owned()),
        ]
        .into_iter()
        .collect();
        assert!(LircSocketListener::create("lircd", &bad).is_err());
    }

    #[tokio::test]
    async fn read_error_keeps_connection_and_retries() {
        let script = VecDeque::from([
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"01 00 KEY_A remote\n".to_vec()),
        ]);
        // The socket path does not exist, so any reconnect attempt would stall.
        let mut listener = LircSocketListener::new("lircd", "/nonexistent/lircd")
            .with_short_backoff(Duration::from_millis(10))
            .with_long_backoff(Duration::from_secs(60));
        listener.reader = Some(Box::new(BufReader::new(Scripted(script))));

        let mut stream = CommandStream::new();
        let handle = stream.handle();
        let task = tokio::spawn(async move { listener.read_loop(&handle).await });

        let event = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.key(), "KEY_A");
        assert!(!stream.is_fatal());
        assert!(matches!(
            stream.take_error(),
            Some(CoreError::ListenerRead { .. })
        ));
        task.abort();
    }
}
