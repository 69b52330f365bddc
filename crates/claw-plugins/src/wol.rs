// ── Wake-on-LAN ──

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use claw_core::{CoreError, Params};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::Error;

const WOL_PORT: u16 = 9;
const SYNC_STREAM: [u8; 6] = [0xFF; 6];
const MAC_REPEATS: usize = 16;

/// Size of a magic packet in bytes.
pub const MAGIC_PACKET_LEN: usize = SYNC_STREAM.len() + MAC_REPEATS * 6;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(self) -> [u8; 6] {
        self.0
    }

    /// Six `0xFF` bytes followed by the address sixteen times.
    pub fn magic_packet(self) -> [u8; MAGIC_PACKET_LEN] {
        let mut packet = [0u8; MAGIC_PACKET_LEN];
        let (sync, body) = packet.split_at_mut(SYNC_STREAM.len());
        sync.copy_from_slice(&SYNC_STREAM);
        for chunk in body.chunks_exact_mut(6) {
            chunk.copy_from_slice(&self.0);
        }
        packet
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMac(s.to_owned());
        let sep = if s.contains('-') { '-' } else { ':' };
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(sep);
        for slot in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Read the optional `wol` MAC parameter shared by targets that can be
/// woken over the network.
pub fn mac_param(plugin: &str, name: &str, params: &Params) -> Result<Option<MacAddress>, CoreError> {
    params
        .get("wol")
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(str::parse::<MacAddress>)
        .transpose()
        .map_err(|e: Error| CoreError::InvalidParameters {
            plugin: plugin.into(),
            name: name.into(),
            reason: e.to_string(),
        })
}

/// Broadcast a magic packet for `mac` on the local network.
pub async fn wake(mac: MacAddress) -> Result<(), Error> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    let dest = SocketAddr::from((Ipv4Addr::BROADCAST, WOL_PORT));
    socket.send_to(&mac.magic_packet(), dest).await?;
    debug!(%mac, "sent wake-on-LAN packet");
    Ok(())
}
