//! `linux` target: a host that can only be woken over the network.

use async_trait::async_trait;
use claw_core::{CommandMap, CoreError, Params, Target};
use tracing::debug;

use crate::error::Error;
use crate::wol::{self, MacAddress};

pub const PLUGIN_TYPE: &str = "linux";

/// Accepts any argument list; only `PowerOn` does anything.
pub struct LinuxHost {
    name: String,
    wol: Option<MacAddress>,
    commands: CommandMap,
}

impl LinuxHost {
    pub fn new(name: impl Into<String>, wol: Option<MacAddress>) -> Self {
        Self {
            name: name.into(),
            wol,
            commands: CommandMap::new(),
        }
    }

    /// Factory registered under [`PLUGIN_TYPE`]. Params: `wol`.
    pub fn create(name: &str, params: &Params) -> Result<Box<dyn Target>, CoreError> {
        let mac = wol::mac_param(PLUGIN_TYPE, name, params)?;
        Ok(Box::new(Self::new(name, mac)))
    }

    async fn power_on(&self) -> Result<(), Error> {
        let Some(mac) = self.wol else {
            return Err(Error::NotConfigured(format!(
                "no wol address configured for {}",
                self.name
            )));
        };
        debug!(target = %self.name, %mac, "power on");
        wol::wake(mac).await
    }
}

#[async_trait]
impl Target for LinuxHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&self) -> &CommandMap {
        &self.commands
    }

    async fn send_command(&self, command: &str, _args: &[String]) -> Result<(), CoreError> {
        let result = if command.eq_ignore_ascii_case("poweron") {
            self.power_on().await
        } else {
            Err(Error::Unsupported(command.to_owned()))
        };
        result.map_err(|e| e.for_target(&self.name))
    }

    async fn stop(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn empty_vocabulary_and_unknown_commands() {
        let host = LinuxHost::create("pc", &Params::new()).unwrap();
        assert!(host.commands().is_empty());

        let err = host.send_command("Reboot", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Target 'pc' failed: Unsupported command 'Reboot'");
    }

    #[tokio::test]
    async fn power_on_without_mac_is_an_error() {
        let host = LinuxHost::new("pc", None);
        assert!(host.send_command("PowerOn", &[]).await.is_err());
        assert!(host.send_command("poweron", &[]).await.is_err());
    }
}
