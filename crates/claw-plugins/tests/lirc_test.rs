// lircsocket listener against a fake lircd on a temporary unix socket.
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::time::Duration;

use claw_core::{CommandStream, CoreError, Params, PluginSpec, RemoteCommand};
use claw_plugins::{LircSocketListener, default_registries};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::time::timeout;

// ── Helpers ─────────────────────────────────────────────────────────

async fn next_event(stream: &mut CommandStream) -> RemoteCommand {
    timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for an event")
        .expect("stream ended")
}

fn fast(path: &Path) -> LircSocketListener {
    LircSocketListener::new("lircd", path)
        .with_short_backoff(Duration::from_millis(10))
        .with_long_backoff(Duration::from_millis(10))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn emits_events_and_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lircd");
    let server = UnixListener::bind(&path).unwrap();

    let mut stream = CommandStream::new();
    stream.add_listener(Box::new(fast(&path)));

    let (mut conn, _) = server.accept().await.unwrap();
    conn.write_all(
        b"0000000000f40bf0 00 KEY_POWER living-room\n\
          garbage\n\
          0000000000f40bf0 zz KEY_POWER living-room\n\
          0000000000f40bf1 0a KEY_VOLUMEUP den\n",
    )
    .await
    .unwrap();

    let first = next_event(&mut stream).await;
    assert_eq!(first.key(), "KEY_POWER");
    assert_eq!(first.source(), "living-room");
    assert_eq!(first.repeat(), 0);

    let second = next_event(&mut stream).await;
    assert_eq!(second.key(), "KEY_VOLUMEUP");
    assert_eq!(second.source(), "den");
    assert_eq!(second.repeat(), 10);
    assert!(second.time() >= first.time());

    assert!(!stream.is_fatal());
    assert!(!stream.has_error());
    stream.close().await;
}

#[tokio::test]
async fn invalid_utf8_line_is_skipped_without_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lircd");
    let server = UnixListener::bind(&path).unwrap();

    let mut stream = CommandStream::new();
    stream.add_listener(Box::new(
        LircSocketListener::new("lircd", &path)
            .with_short_backoff(Duration::from_secs(30))
            .with_long_backoff(Duration::from_secs(30)),
    ));

    let (mut conn, _) = server.accept().await.unwrap();
    conn.write_all(b"00f4 00 KEY_\xff\xfe remote\n0001 00 KEY_A remote\n")
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("line after invalid UTF-8 was held back")
        .unwrap();
    assert_eq!(event.key(), "KEY_A");
    assert!(!stream.has_error());
    stream.close().await;
}

#[tokio::test]
async fn resumes_after_lircd_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lircd");
    let server = UnixListener::bind(&path).unwrap();

    let mut stream = CommandStream::new();
    stream.add_listener(Box::new(
        LircSocketListener::new("lircd", &path)
            .with_short_backoff(Duration::from_millis(200))
            .with_long_backoff(Duration::from_millis(20)),
    ));

    let (mut conn, _) = server.accept().await.unwrap();
    conn.write_all(b"01 00 KEY_A remote\n").await.unwrap();
    assert_eq!(next_event(&mut stream).await.key(), "KEY_A");

    // lircd goes away entirely; reconnect attempts fail for a while.
    drop(conn);
    drop(server);
    tokio::time::sleep(Duration::from_millis(400)).await;

    std::fs::remove_file(&path).unwrap();
    let server = UnixListener::bind(&path).unwrap();
    let (mut conn, _) = server.accept().await.unwrap();
    conn.write_all(b"02 00 KEY_B remote\n").await.unwrap();

    assert_eq!(next_event(&mut stream).await.key(), "KEY_B");
    assert!(!stream.is_fatal());
    assert!(stream.has_error());
    assert!(matches!(
        stream.take_error(),
        Some(CoreError::ListenerConnection { .. })
    ));
    stream.close().await;
}

#[tokio::test]
async fn missing_socket_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent");

    let mut stream = CommandStream::new();
    stream.add_listener(Box::new(fast(&path)));

    let next = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
    assert!(next.is_none());
    assert!(stream.is_fatal());
    assert!(matches!(
        stream.take_error(),
        Some(CoreError::ListenerConnection { .. })
    ));
}

#[tokio::test]
async fn created_through_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lircd");
    let server = UnixListener::bind(&path).unwrap();

    let (listeners, _) = default_registries().unwrap();
    let mut params = Params::new();
    params.insert("path".into(), path.display().to_string());
    let listener = listeners
        .create("lircd", &PluginSpec::new("lircsocket", params))
        .unwrap();

    let mut stream = CommandStream::new();
    stream.add_listener(listener);
    let (mut conn, _) = server.accept().await.unwrap();
    conn.write_all(b"ff 01 KEY_MUTE kitchen\n").await.unwrap();

    let event = next_event(&mut stream).await;
    assert_eq!(event.code(), "ff");
    assert!(event.is_repeat());
    stream.close().await;
}
