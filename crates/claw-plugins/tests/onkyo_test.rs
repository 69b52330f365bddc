// Onkyo target against a fake eISCP receiver on localhost.
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use claw_core::{CoreError, Target};
use claw_plugins::OnkyoReceiver;
use claw_plugins::targets::onkyo::eiscp;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ── Helpers ─────────────────────────────────────────────────────────

/// Accept connections forever, forwarding every received command. A
/// `PWRQSTN` query is answered with `replies`, in order.
async fn fake_receiver(replies: &'static [&'static str]) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut conn, _)) = server.accept().await else {
                return;
            };
            while let Ok(code) = eiscp::read_message(&mut conn).await {
                let is_query = code == "PWRQSTN";
                let _ = tx.send(code);
                if is_query {
                    for reply in replies {
                        let _ = conn.write_all(&eiscp::encode(reply)).await;
                    }
                }
            }
        }
    });

    (addr, rx)
}

fn receiver(addr: SocketAddr) -> OnkyoReceiver {
    OnkyoReceiver::new("receiver", addr.ip().to_string(), addr.port())
        .with_timeout(Duration::from_millis(500))
}

async fn received(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn simple_commands_map_to_iscp_codes() {
    let (addr, mut rx) = fake_receiver(&[]).await;
    let target = receiver(addr);

    let cases: &[(&str, &[&str], &str)] = &[
        ("PowerOn", &[], "PWR01"),
        ("PowerOff", &[], "PWR00"),
        ("Power", &["off"], "PWR00"),
        ("MuteOn", &[], "AMT01"),
        ("MuteToggle", &[], "AMTTG"),
        ("Mute", &["off"], "AMT00"),
        ("VolumeUp", &[], "MVLUP"),
        ("VolumeDown", &[], "MVLDOWN"),
        ("Volume", &["32"], "MVL20"),
        ("Volume", &["7"], "MVL07"),
    ];
    for (command, args, want) in cases {
        let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        target.send_command(command, &args).await.unwrap();
        assert_eq!(received(&mut rx).await, *want, "{command}");
    }
}

#[tokio::test]
async fn power_toggle_turns_standby_on() {
    let (addr, mut rx) = fake_receiver(&["PWR00"]).await;
    let target = receiver(addr);

    target.send_command("PowerToggle", &[]).await.unwrap();
    assert_eq!(received(&mut rx).await, "PWRQSTN");
    assert_eq!(received(&mut rx).await, "PWR01");
}

#[tokio::test]
async fn power_toggle_skips_unsolicited_status() {
    let (addr, mut rx) = fake_receiver(&["MVL20", "PWR01"]).await;
    let target = receiver(addr);

    target.send_command("PowerToggle", &[]).await.unwrap();
    assert_eq!(received(&mut rx).await, "PWRQSTN");
    assert_eq!(received(&mut rx).await, "PWR00");
}

#[tokio::test]
async fn silent_receiver_times_out() {
    let (addr, _rx) = fake_receiver(&[]).await;
    let target = receiver(addr).with_timeout(Duration::from_millis(100));

    let err = target.send_command("PowerToggle", &[]).await.unwrap_err();
    assert!(matches!(err, CoreError::TargetFailed { .. }));
    assert!(err.to_string().contains("Timed out"), "{err}");
}

#[tokio::test]
async fn refused_connection_is_a_target_failure() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    drop(server);

    let err = receiver(addr)
        .send_command("PowerOn", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TargetFailed { .. }));
}
