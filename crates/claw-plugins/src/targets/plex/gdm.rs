// ── GDM discovery ──
//
// Plex players answer a UDP `M-SEARCH` on the GDM multicast group with an
// HTTP-style block of `Key: value` headers. The watcher repeats the search
// every interval and publishes the matching player into a shared slot.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;

/// Multicast group and port players listen on.
pub const GDM_PLAYER_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 0, 0, 250)), 32412);

const SEARCH: &[u8] = b"M-SEARCH * HTTP/1.0\r\n\r\n";
const MAX_DATAGRAM: usize = 4096;

/// One player's answer to a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdmResponse {
    pub address: IpAddr,
    pub props: BTreeMap<String, String>,
}

/// A discovered player, ready to receive commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlexClient {
    pub url: Url,
    pub resource_identifier: Option<String>,
    pub capabilities: Vec<String>,
}

impl PlexClient {
    /// True when the player advertises `capability`, or advertises nothing.
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.is_empty() || self.capabilities.iter().any(|c| c == capability)
    }
}

/// Parse a GDM answer. Returns `None` for anything that is not a `200`.
pub fn parse_response(address: IpAddr, datagram: &[u8]) -> Option<GdmResponse> {
    let text = std::str::from_utf8(datagram).ok()?;
    let mut lines = text.lines();
    let status = lines.next()?;
    let mut status = status.split_whitespace();
    let is_ok = status.next().is_some_and(|v| v.starts_with("HTTP/")) && status.next() == Some("200");
    if !is_ok {
        return None;
    }
    let props = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .filter(|(k, _)| !k.is_empty())
        .collect();
    Some(GdmResponse { address, props })
}

impl GdmResponse {
    /// The player this response describes, if its `Name` is `wanted`.
    pub fn client_for(&self, wanted: &str) -> Option<PlexClient> {
        if self.props.get("Name").map(String::as_str) != Some(wanted) {
            return None;
        }
        let port: u16 = self.props.get("Port")?.parse().ok()?;
        let url = Url::parse(&format!("http://{}/", SocketAddr::new(self.address, port))).ok()?;
        let capabilities = self
            .props
            .get("Protocol-Capabilities")
            .map(|caps| {
                caps.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        Some(PlexClient {
            url,
            resource_identifier: self.props.get("Resource-Identifier").cloned(),
            capabilities,
        })
    }
}

// ── Watcher ──────────────────────────────────────────────────────────

/// Search for `client_name` every `interval` until cancelled.
pub async fn watch(
    client_name: String,
    interval: Duration,
    slot: Arc<RwLock<Option<PlexClient>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = search_once(&client_name, interval) => match result {
                Ok(Some(found)) => {
                    let mut current = slot.write().await;
                    if current.as_ref() != Some(&found) {
                        info!(client = %client_name, url = %found.url, "plex client discovered");
                    }
                    *current = Some(found);
                }
                Ok(None) => trace!(client = %client_name, "no matching plex client"),
                Err(e) => {
                    warn!(client = %client_name, error = %e, "GDM search failed");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(interval) => {}
                    }
                }
            },
        }
    }
    debug!(client = %client_name, "GDM watcher exiting");
}

/// Send one search and collect answers for `window`.
async fn search_once(client_name: &str, window: Duration) -> Result<Option<PlexClient>, Error> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.send_to(SEARCH, GDM_PLAYER_ADDR).await?;

    let deadline = tokio::time::Instant::now() + window;
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut found = None;
    loop {
        let Ok(received) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await
        else {
            break;
        };
        let (len, from) = received?;
        let Some(response) = parse_response(from.ip(), buf.get(..len).unwrap_or_default()) else {
            continue;
        };
        if let Some(client) = response.client_for(client_name) {
            found = Some(client);
        }
    }
    Ok(found)
}
