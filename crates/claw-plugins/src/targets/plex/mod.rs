//! `plex` target: a Plex player found by GDM discovery and driven through
//! its HTTP remote-control API.
//!
//! The player's address is not configured. A background watcher searches
//! for a player whose GDM `Name` matches the `name` param and publishes its
//! URL; until that happens every HTTP command fails with
//! [`CoreError::TargetUnavailable`]. A second task polls the player's
//! timeline so playback commands name the media type on screen.

pub mod commands;
pub mod gdm;
pub mod timeline;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use claw_core::{CommandMap, CoreError, Params, Target, parsed_param, required_param};
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use self::commands::Request;
pub use self::gdm::PlexClient;
use self::timeline::{Poller, TimelineParser};
pub use self::timeline::{MediaType, Timeline};
use crate::error::Error;
use crate::transport::TransportConfig;
use crate::wol::{self, MacAddress};

pub const PLUGIN_TYPE: &str = "plex";

const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 5;
const DEFAULT_TIMELINE_INTERVAL_SECS: u64 = 1;

const CLIENT_ID_HEADER: &str = "X-Plex-Client-Identifier";
const TARGET_ID_HEADER: &str = "X-Plex-Target-Client-Identifier";
const DEVICE_NAME_HEADER: &str = "X-Plex-Device-Name";

pub(crate) type Slot<T> = Arc<RwLock<Option<T>>>;

pub struct PlexTarget {
    name: String,
    client_name: String,
    wol: Option<MacAddress>,
    http: reqwest::Client,
    client: Slot<PlexClient>,
    timeline: Slot<Timeline>,
    command_id: Arc<AtomicU64>,
    commands: CommandMap,
    cancel: CancellationToken,
}

impl PlexTarget {
    /// A target with no background task running. Call
    /// [`spawn_discovery`](Self::spawn_discovery) or
    /// [`set_client`](Self::set_client) before sending HTTP commands.
    pub fn new(
        name: impl Into<String>,
        client_name: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let id = Uuid::new_v4().to_string();
        headers.insert(
            CLIENT_ID_HEADER,
            HeaderValue::from_str(&id).map_err(|e| Error::Protocol(e.to_string()))?,
        );
        headers.insert(DEVICE_NAME_HEADER, HeaderValue::from_static("claw"));

        Ok(Self {
            name: name.into(),
            client_name: client_name.into(),
            wol: None,
            http: transport.build_client(headers)?,
            client: Arc::new(RwLock::new(None)),
            timeline: Arc::new(RwLock::new(None)),
            command_id: Arc::new(AtomicU64::new(1)),
            commands: commands::vocabulary(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_wol(mut self, mac: Option<MacAddress>) -> Self {
        self.wol = mac;
        self
    }

    /// Factory registered under [`PLUGIN_TYPE`].
    ///
    /// Params: `name` (required), `wol`, `discovery_interval_secs`,
    /// `timeline_interval_secs`. Starts the GDM watcher and the timeline
    /// poller on the current tokio runtime.
    pub fn create(name: &str, params: &Params) -> Result<Box<dyn Target>, CoreError> {
        let (target, discovery, timeline) = Self::from_params(name, params)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            CoreError::Internal(format!("plex target '{name}' needs a tokio runtime: {e}"))
        })?;
        target.spawn_discovery(&runtime, discovery);
        target
            .spawn_timeline(&runtime, timeline)
            .map_err(|e| e.for_target(name))?;
        Ok(Box::new(target))
    }

    /// Same params as [`create`](Self::create), but nothing is spawned and
    /// the target stays silent on the network.
    pub fn create_offline(name: &str, params: &Params) -> Result<Box<dyn Target>, CoreError> {
        Ok(Box::new(Self::from_params(name, params)?.0))
    }

    fn from_params(name: &str, params: &Params) -> Result<(Self, Duration, Duration), CoreError> {
        let client_name = required_param(PLUGIN_TYPE, name, params, "name")?;
        let mac = wol::mac_param(PLUGIN_TYPE, name, params)?;
        let interval = |key: &str, default: u64| {
            parsed_param(PLUGIN_TYPE, name, params, key, default)
                .map(|secs: u64| Duration::from_secs(secs.max(1)))
        };
        let discovery = interval("discovery_interval_secs", DEFAULT_DISCOVERY_INTERVAL_SECS)?;
        let timeline = interval("timeline_interval_secs", DEFAULT_TIMELINE_INTERVAL_SECS)?;

        let target = Self::new(name, client_name, &TransportConfig::default())
            .map_err(|e| e.for_target(name))?
            .with_wol(mac);
        Ok((target, discovery, timeline))
    }

    /// Start the GDM watcher. It runs until [`Target::stop`].
    pub fn spawn_discovery(&self, runtime: &tokio::runtime::Handle, interval: Duration) {
        debug!(target = %self.name, client = %self.client_name, "starting GDM watcher");
        runtime.spawn(gdm::watch(
            self.client_name.clone(),
            interval,
            Arc::clone(&self.client),
            self.cancel.clone(),
        ));
    }

    /// Start the timeline poller. It runs until [`Target::stop`] and only
    /// polls players that advertise the `timeline` capability.
    pub fn spawn_timeline(
        &self,
        runtime: &tokio::runtime::Handle,
        interval: Duration,
    ) -> Result<(), Error> {
        let poller = Poller {
            name: self.name.clone(),
            http: self.http.clone(),
            client: Arc::clone(&self.client),
            timeline: Arc::clone(&self.timeline),
            command_id: Arc::clone(&self.command_id),
            parser: TimelineParser::new()?,
            interval,
        };
        runtime.spawn(poller.run(self.cancel.clone()));
        Ok(())
    }

    /// Publish a timeline report, as the poller would.
    pub async fn set_timeline(&self, timeline: Option<Timeline>) {
        *self.timeline.write().await = timeline;
    }

    /// Media type for playback requests: the latest timeline's, else video.
    pub async fn media_type(&self) -> MediaType {
        self.timeline
            .read()
            .await
            .as_ref()
            .map(Timeline::media_type)
            .unwrap_or_default()
    }

    /// Publish a player, as discovery would.
    pub async fn set_client(&self, client: PlexClient) {
        *self.client.write().await = Some(client);
    }

    /// The currently known player, if any.
    pub async fn client(&self) -> Option<PlexClient> {
        self.client.read().await.clone()
    }

    fn next_command_id(&self) -> u64 {
        self.command_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn power_on(&self) -> Result<(), Error> {
        let Some(mac) = self.wol else {
            return Err(Error::NotConfigured(format!(
                "no wol address configured for {}",
                self.name
            )));
        };
        wol::wake(mac).await
    }

    async fn get(&self, command: &str, request: Request) -> Result<(), Error> {
        let Some(client) = self.client().await else {
            return Err(Error::Unavailable(format!(
                "player '{}' not discovered yet",
                self.client_name
            )));
        };
        if !client.supports(request.capability) {
            return Err(Error::Unsupported(format!(
                "{command} (player lacks '{}')",
                request.capability
            )));
        }

        let mut url = client.url.join(request.path)?;
        url.query_pairs_mut()
            .extend_pairs(request.query.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("commandID", &self.next_command_id().to_string());
        debug!(target = %self.name, %url, "plex GET");
        player_get(&self.http, &client, url).await.map(drop)
    }

    async fn run(&self, command: &str, args: &[String]) -> Result<(), Error> {
        if command == "PowerOn" {
            return self.power_on().await;
        }
        let media = self.media_type().await;
        let request = commands::request(command, args, media)
            .ok_or_else(|| Error::Unsupported(command.to_owned()))?;
        self.get(command, request).await
    }
}

/// GET `url` on `client`, failing on any non-2xx status.
async fn player_get(
    http: &reqwest::Client,
    client: &PlexClient,
    url: url::Url,
) -> Result<reqwest::Response, Error> {
    let mut req = http.get(url.clone());
    if let Some(id) = &client.resource_identifier {
        req = req.header(TARGET_ID_HEADER, id);
    }
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp)
}

#[async_trait]
impl Target for PlexTarget {
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
        self.cancel.cancel();
        Ok(())
    }
}

impl Drop for PlexTarget {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
