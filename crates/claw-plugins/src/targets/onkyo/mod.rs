//! `onkyo` target: Onkyo/Integra receivers over eISCP (TCP port 60128).

pub mod eiscp;

use std::time::Duration;

use async_trait::async_trait;
use claw_core::{
    Command, CommandMap, CommandParameter, CoreError, Params, Target, command_map, parsed_param,
    required_param,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Error;

pub const PLUGIN_TYPE: &str = "onkyo";

pub const DEFAULT_PORT: u16 = 60128;
pub const DEFAULT_MAX_VOLUME: u8 = 77;
const DEFAULT_TIMEOUT_MS: u64 = 2000;

const STATES: [&str; 3] = ["on", "off", "toggle"];

/// Command vocabulary; `max_volume` bounds the `Volume` argument.
pub fn vocabulary(max_volume: u8) -> CommandMap {
    command_map([
        Command::new("PowerOn", "Powers on the receiver"),
        Command::new("PowerOff", "Powers off the receiver"),
        Command::new("PowerToggle", "Toggles the power state"),
        Command::new("Power", "Sets the power state").with_parameter(
            CommandParameter::new("powerstate", "The power state").with_list(STATES),
        ),
        Command::new("MuteOn", "Mutes the sound"),
        Command::new("MuteOff", "Unmutes the sound"),
        Command::new("MuteToggle", "Toggles the muting of the sound"),
        Command::new("Mute", "Sets the mute state").with_parameter(
            CommandParameter::new("mutestate", "The mute state").with_list(STATES),
        ),
        Command::new("VolumeUp", "Turns up the volume"),
        Command::new("VolumeDown", "Turns down the volume"),
        Command::new("Volume", "Sets the volume").with_parameter(
            CommandParameter::new("volumelevel", "The volume level")
                .with_range(0, i64::from(max_volume)),
        ),
    ])
}

pub struct OnkyoReceiver {
    name: String,
    host: String,
    port: u16,
    timeout: Duration,
    commands: CommandMap,
}

impl OnkyoReceiver {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            commands: vocabulary(DEFAULT_MAX_VOLUME),
        }
    }

    pub fn with_max_volume(mut self, max_volume: u8) -> Self {
        self.commands = vocabulary(max_volume);
        self
    }

    /// Bound on connect, write and reply wait for each command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Factory registered under [`PLUGIN_TYPE`].
    ///
    /// Params: `host` (required), `port`, `max_volume`, `timeout_ms`.
    pub fn create(name: &str, params: &Params) -> Result<Box<dyn Target>, CoreError> {
        let host = required_param(PLUGIN_TYPE, name, params, "host")?;
        let port = parsed_param(PLUGIN_TYPE, name, params, "port", DEFAULT_PORT)?;
        let max_volume =
            parsed_param(PLUGIN_TYPE, name, params, "max_volume", DEFAULT_MAX_VOLUME)?;
        let timeout_ms = parsed_param(PLUGIN_TYPE, name, params, "timeout_ms", DEFAULT_TIMEOUT_MS)?;
        Ok(Box::new(
            Self::new(name, host, port)
                .with_max_volume(max_volume)
                .with_timeout(Duration::from_millis(timeout_ms)),
        ))
    }

    fn timeout_err(&self) -> Error {
        Error::Timeout {
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    async fn connect(&self) -> Result<TcpStream, Error> {
        tokio::time::timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|_| self.timeout_err())?
            .map_err(Error::Io)
    }

    /// Fire-and-forget a single ISCP command.
    async fn send(&self, code: &str) -> Result<(), Error> {
        debug!(target = %self.name, code, "eISCP send");
        let mut conn = self.connect().await?;
        let frame = eiscp::encode(code);
        tokio::time::timeout(self.timeout, write_and_close(&mut conn, &frame))
            .await
            .map_err(|_| self.timeout_err())??;
        Ok(())
    }

    /// Send a `QSTN` command and wait for the reply with the same prefix.
    async fn query(&self, code: &str) -> Result<String, Error> {
        let mut conn = self.connect().await?;
        tokio::time::timeout(self.timeout, self.exchange(&mut conn, code))
            .await
            .map_err(|_| self.timeout_err())?
    }

    async fn exchange(&self, conn: &mut TcpStream, code: &str) -> Result<String, Error> {
        let prefix = code.get(..3).unwrap_or(code);
        conn.write_all(&eiscp::encode(code)).await?;
        // Receivers also push unsolicited status; skip anything else.
        loop {
            let reply = eiscp::read_message(conn).await?;
            debug!(target = %self.name, %reply, "eISCP reply");
            if reply.starts_with(prefix) {
                return Ok(reply);
            }
        }
    }

    async fn power(&self, state: &str) -> Result<(), Error> {
        match state {
            "on" => self.send("PWR01").await,
            "off" => self.send("PWR00").await,
            "toggle" => {
                let current = self.query("PWRQSTN").await?;
                let next = if current == "PWR00" { "PWR01" } else { "PWR00" };
                debug!(target = %self.name, %current, next, "power toggle");
                self.send(next).await
            }
            other => Err(Error::Unsupported(format!("Power {other}"))),
        }
    }

    async fn mute(&self, state: &str) -> Result<(), Error> {
        match state {
            "on" => self.send("AMT01").await,
            "off" => self.send("AMT00").await,
            "toggle" => self.send("AMTTG").await,
            other => Err(Error::Unsupported(format!("Mute {other}"))),
        }
    }

    async fn volume(&self, level: &str) -> Result<(), Error> {
        let level: u8 = level
            .parse()
            .map_err(|_| Error::Protocol(format!("volume level '{level}'")))?;
        self.send(&format!("MVL{level:02X}")).await
    }

    async fn run(&self, command: &str, args: &[String]) -> Result<(), Error> {
        let first = || args.first().map(String::as_str).unwrap_or_default();
        match command {
            "PowerOn" => self.power("on").await,
            "PowerOff" => self.power("off").await,
            "PowerToggle" => self.power("toggle").await,
            "Power" => self.power(first()).await,
            "MuteOn" => self.mute("on").await,
            "MuteOff" => self.mute("off").await,
            "MuteToggle" => self.mute("toggle").await,
            "Mute" => self.mute(first()).await,
            "VolumeUp" => self.send("MVLUP").await,
            "VolumeDown" => self.send("MVLDOWN").await,
            "Volume" => self.volume(first()).await,
            other => Err(Error::Unsupported(other.to_owned())),
        }
    }
}

async fn write_and_close(conn: &mut TcpStream, frame: &[u8]) -> std::io::Result<()> {
    conn.write_all(frame).await?;
    conn.shutdown().await
}

#[async_trait]
impl Target for OnkyoReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&self) -> &CommandMap {
        &self.commands
    }

    async fn send_command(&self, command: &str, args: &[String]) -> Result<(), CoreError> {
        self.run(command, args)
            .await
            .map_err(|e| e.for_target(&self.name))
    }

    async fn stop(&self) -> Result<(), CoreError> {
        Ok(())
    }
}
